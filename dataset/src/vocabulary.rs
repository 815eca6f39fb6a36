use std::collections::HashMap;

use crate::{DatasetError, Result};

/// Ordered, duplicate-free class names. The order fixes the one-hot column
/// of every class, so writers and readers must share the same vocabulary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassVocabulary {
    names: Vec<String>,
    class_to_arg: HashMap<String, usize>,
}

impl ClassVocabulary {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut class_to_arg = HashMap::with_capacity(names.len());
        for (arg, name) in names.iter().enumerate() {
            if class_to_arg.insert(name.clone(), arg).is_some() {
                return Err(DatasetError::DuplicateClass(name.clone()));
            }
        }
        Ok(Self {
            names,
            class_to_arg,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.class_to_arg.get(name).copied()
    }

    pub fn name_of(&self, arg: usize) -> Option<&str> {
        self.names.get(arg).map(String::as_str)
    }

    pub fn one_hot(&self, name: &str) -> Option<Vec<f64>> {
        let arg = self.index_of(name)?;
        let mut v = vec![0.0; self.len()];
        v[arg] = 1.0;
        Some(v)
    }
}
