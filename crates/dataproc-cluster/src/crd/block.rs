//! Deserialization of nested configuration blocks.
//!
//! Older documents express optional nested blocks as lists which may contain at most one element.
//! Both that form and a plain map are accepted, anything longer is rejected while loading the
//! document, so the rest of the crate only ever deals with [`Option`]s.

use std::{fmt, marker::PhantomData};

use serde::{
    Deserialize, Deserializer,
    de::{Error as _, MapAccess, SeqAccess, Visitor, value::MapAccessDeserializer},
};

use crate::validation;

struct BlockVisitor<T> {
    block: &'static str,
    marker: PhantomData<T>,
}

impl<'de, T> Visitor<'de> for BlockVisitor<T>
where
    T: Deserialize<'de>,
{
    type Value = Option<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "a {} block or a list containing at most one",
            self.block
        )
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        T::deserialize(MapAccessDeserializer::new(map)).map(Some)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut first = None;
        let mut count = 0;
        while let Some(value) = seq.next_element::<T>()? {
            count += 1;
            first.get_or_insert(value);
        }

        if count > 1 {
            return Err(A::Error::custom(validation::Error::TooManyBlocks {
                block: self.block.to_owned(),
                count,
            }));
        }
        Ok(first)
    }
}

fn at_most_one<'de, D, T>(deserializer: D, block: &'static str) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    deserializer.deserialize_any(BlockVisitor {
        block,
        marker: PhantomData,
    })
}

macro_rules! single_block {
    ($($name:ident),* $(,)?) => {
        $(
            pub(crate) fn $name<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
            where
                D: Deserializer<'de>,
                T: Deserialize<'de>,
            {
                at_most_one(deserializer, stringify!($name))
            }
        )*
    };
}

single_block!(
    cluster_config,
    gce_cluster_config,
    master_config,
    worker_config,
    preemptible_worker_config,
    software_config,
    disk_config,
);
