use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{Result, vocabulary::ClassVocabulary};

/// Model file path to class name. Built once, read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatasetIndex {
    path_to_class: BTreeMap<PathBuf, String>,
}

impl DatasetIndex {
    pub fn len(&self) -> usize {
        self.path_to_class.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_to_class.is_empty()
    }

    pub fn class_of(&self, path: &Path) -> Option<&str> {
        self.path_to_class.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.path_to_class
            .iter()
            .map(|(p, c)| (p.as_path(), c.as_str()))
    }

    pub fn entries(&self) -> Vec<(PathBuf, String)> {
        self.path_to_class
            .iter()
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect()
    }

    pub fn models_of(&self, class_name: &str) -> Vec<&Path> {
        self.iter()
            .filter(|(_, c)| *c == class_name)
            .map(|(p, _)| p)
            .collect()
    }

    /// Distinct classes present in the index, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        self.path_to_class
            .values()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl FromIterator<(PathBuf, String)> for DatasetIndex {
    fn from_iter<T: IntoIterator<Item = (PathBuf, String)>>(iter: T) -> Self {
        Self {
            path_to_class: iter.into_iter().collect(),
        }
    }
}

/// Directory offset to class name, e.g. WordNet synset offsets used as
/// ShapeNet category folder names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffsetTable {
    offset_to_name: BTreeMap<String, String>,
}

impl OffsetTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            offset_to_name: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn shapenet_core() -> Self {
        Self::new(SHAPENET_CORE_OFFSETS.iter().copied())
    }

    pub fn name_of(&self, offset: &str) -> Option<&str> {
        self.offset_to_name.get(offset).map(String::as_str)
    }

    /// Class names in offset order.
    pub fn class_names(&self) -> Vec<String> {
        self.offset_to_name.values().cloned().collect()
    }

    pub fn vocabulary(&self) -> Result<ClassVocabulary> {
        ClassVocabulary::new(self.class_names())
    }
}

const SHAPENET_CORE_OFFSETS: [(&str, &str); 55] = [
    ("02691156", "airplane"),
    ("02747177", "ashcan"),
    ("02773838", "bag"),
    ("02801938", "basket"),
    ("02808440", "bathtub"),
    ("02818832", "bed"),
    ("02828884", "bench"),
    ("02843684", "birdhouse"),
    ("02871439", "bookshelf"),
    ("02876657", "bottle"),
    ("02880940", "bowl"),
    ("02924116", "bus"),
    ("02933112", "cabinet"),
    ("02942699", "camera"),
    ("02946921", "can"),
    ("02954340", "cap"),
    ("02958343", "car"),
    ("02992529", "cellular_telephone"),
    ("03001627", "chair"),
    ("03046257", "clock"),
    ("03085013", "computer_keyboard"),
    ("03207941", "dishwasher"),
    ("03211117", "display"),
    ("03261776", "earphone"),
    ("03325088", "faucet"),
    ("03337140", "file"),
    ("03467517", "guitar"),
    ("03513137", "helmet"),
    ("03593526", "jar"),
    ("03624134", "knife"),
    ("03636649", "lamp"),
    ("03642806", "laptop"),
    ("03691459", "loudspeaker"),
    ("03710193", "mailbox"),
    ("03759954", "microphone"),
    ("03761084", "microwave"),
    ("03790512", "motorcycle"),
    ("03797390", "mug"),
    ("03928116", "piano"),
    ("03938244", "pillow"),
    ("03948459", "pistol"),
    ("03991062", "pot"),
    ("04004475", "printer"),
    ("04074963", "remote_control"),
    ("04090263", "rifle"),
    ("04099429", "rocket"),
    ("04225987", "skateboard"),
    ("04256520", "sofa"),
    ("04330267", "stove"),
    ("04379243", "table"),
    ("04401088", "telephone"),
    ("04460130", "tower"),
    ("04468005", "train"),
    ("04530566", "vessel"),
    ("04554684", "washer"),
];

/// `<root>/<offset>/<model_id>/models/*.obj`, class taken from the offset.
pub struct OffsetDatasetManager {
    root: PathBuf,
    table: OffsetTable,
    class_names: Option<Vec<String>>,
}

impl OffsetDatasetManager {
    /// `class_names: None` keeps every class the table knows.
    pub fn new(root: impl Into<PathBuf>, table: OffsetTable, class_names: Option<Vec<String>>) -> Self {
        Self {
            root: root.into(),
            table,
            class_names,
        }
    }

    fn wants(&self, class_name: &str) -> bool {
        self.class_names
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == class_name))
    }

    pub fn load(&self) -> Result<DatasetIndex> {
        let mut index = BTreeMap::new();
        for offset_dir in sorted_dirs(&self.root)? {
            let Some(offset) = offset_dir.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(class_name) = self.table.name_of(offset) else {
                warn!("unknown offset directory {}", offset_dir.display());
                continue;
            };
            if !self.wants(class_name) {
                continue;
            }
            for model_dir in sorted_dirs(&offset_dir)? {
                let models = model_dir.join("models");
                for file in sorted_entries(&models)? {
                    if file.extension().and_then(|s| s.to_str()) == Some("obj") {
                        index.insert(file, class_name.to_string());
                    }
                }
            }
        }
        debug!("indexed {} models under {}", index.len(), self.root.display());
        Ok(DatasetIndex {
            path_to_class: index,
        })
    }
}

pub const FLAT_MODEL_FILE: &str = "textured.obj";

/// `<root>/<class_name>/textured.obj`, one model per class directory.
pub struct FlatDatasetManager {
    root: PathBuf,
    class_names: Option<Vec<String>>,
}

impl FlatDatasetManager {
    pub fn new(root: impl Into<PathBuf>, class_names: Option<Vec<String>>) -> Self {
        Self {
            root: root.into(),
            class_names,
        }
    }

    /// The configured names, or every directory under the root, sorted.
    pub fn class_names(&self) -> Result<Vec<String>> {
        if let Some(names) = &self.class_names {
            return Ok(names.clone());
        }
        Ok(sorted_dirs(&self.root)?
            .iter()
            .filter_map(|p| p.file_name().and_then(|s| s.to_str()).map(str::to_string))
            .collect())
    }

    pub fn load(&self) -> Result<DatasetIndex> {
        Ok(self
            .class_names()?
            .into_iter()
            .map(|name| (self.root.join(&name).join(FLAT_MODEL_FILE), name))
            .collect())
    }
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn sorted_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect())
}
