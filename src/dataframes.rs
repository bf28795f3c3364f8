//! Ordered collection of named dataframes.

use crate::dataframe::AnyDataFrame;
use polyframe_core::{FrameError, Result};
use std::collections::HashMap;

/// Dataframes in insertion order, each under a unique key.
///
/// Frames added without a name get positional keys `_0`, `_1`, ...
#[derive(Debug, Clone, Default)]
pub struct DataFrames {
    frames: Vec<(String, AnyDataFrame)>,
    index: HashMap<String, usize>,
    has_key: bool,
}

impl DataFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_list(frames: impl IntoIterator<Item = AnyDataFrame>) -> Self {
        let mut dfs = Self::new();
        for df in frames {
            dfs.push(df);
        }
        dfs
    }

    pub fn from_named<K: Into<String>>(
        frames: impl IntoIterator<Item = (K, AnyDataFrame)>,
    ) -> Result<Self> {
        let mut dfs = Self::new();
        for (key, df) in frames {
            dfs.insert(key, df)?;
        }
        Ok(dfs)
    }

    /// Append under the next positional key.
    pub fn push(&mut self, df: AnyDataFrame) {
        let mut key = format!("_{}", self.frames.len());
        while self.index.contains_key(&key) {
            key.push('_');
        }
        self.add(key, df);
    }

    /// Append under an explicit key; an existing key is [`FrameError::Duplicate`].
    pub fn insert(&mut self, key: impl Into<String>, df: AnyDataFrame) -> Result<()> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(FrameError::Duplicate(format!("dataframe key '{key}'")));
        }
        self.has_key = true;
        self.add(key, df);
        Ok(())
    }

    fn add(&mut self, key: String, df: AnyDataFrame) {
        self.index.insert(key.clone(), self.frames.len());
        self.frames.push((key, df));
    }

    /// True when at least one frame was added with an explicit key.
    pub fn has_key(&self) -> bool {
        self.has_key
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&AnyDataFrame> {
        self.index.get(key).map(|i| &self.frames[*i].1)
    }

    pub fn get_index(&self, i: usize) -> Option<&AnyDataFrame> {
        self.frames.get(i).map(|(_, df)| df)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &AnyDataFrame> {
        self.frames.iter().map(|(_, df)| df)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnyDataFrame)> {
        self.frames.iter().map(|(k, df)| (k.as_str(), df))
    }

    /// Apply `f` to every frame, keeping keys and order.
    pub fn convert<F>(&self, mut f: F) -> Result<DataFrames>
    where
        F: FnMut(&AnyDataFrame) -> Result<AnyDataFrame>,
    {
        let frames = self
            .frames
            .iter()
            .map(|(k, df)| Ok((k.clone(), f(df)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrames {
            frames,
            index: self.index.clone(),
            has_key: self.has_key,
        })
    }
}
