use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use ndarray::Array2;

use crate::{DatasetError, Result, annotation::read_annotation, vocabulary::ClassVocabulary};

pub const ANNOTATIONS_DIR: &str = "annotations";
pub const IMAGES_DIR: &str = "images";

/// Reads a detection dataset laid out as `<root>/annotations/*.xml` next to
/// `<root>/images/`.
///
/// Each image becomes a `(num_objects, 4 + num_classes)` matrix: columns
/// `0..4` hold the box, the rest the one-hot class. Objects whose class is
/// not in the vocabulary are dropped, and an image left with no objects is
/// not reported at all.
pub struct AnnotationParser {
    dataset_path: PathBuf,
    annotations_path: PathBuf,
    vocabulary: ClassVocabulary,
}

impl AnnotationParser {
    pub fn new(dataset_path: impl Into<PathBuf>, vocabulary: ClassVocabulary) -> Result<Self> {
        let dataset_path = dataset_path.into();
        let annotations_path = require_dir(&dataset_path, ANNOTATIONS_DIR)?;
        require_dir(&dataset_path, IMAGES_DIR)?;
        Ok(Self {
            dataset_path,
            annotations_path,
            vocabulary,
        })
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn vocabulary(&self) -> &ClassVocabulary {
        &self.vocabulary
    }

    pub fn num_classes(&self) -> usize {
        self.vocabulary.len()
    }

    /// Annotation files in lexical order.
    pub fn annotation_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.annotations_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("xml"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Keys are the stored filename with `.png` appended, whatever extension
    /// the stored name already carries.
    pub fn load_data(&self) -> Result<BTreeMap<String, Array2<f64>>> {
        let width = 4 + self.num_classes();
        let mut data = BTreeMap::new();

        for path in self.annotation_files()? {
            let annotation = read_annotation(&path)?;
            let mut rows = 0;
            let mut flat = Vec::with_capacity(annotation.detections.len() * width);
            for detection in &annotation.detections {
                let Some(one_hot) = self.vocabulary.one_hot(&detection.class_name) else {
                    debug!(
                        "{}: skipping object of class '{}'",
                        path.display(),
                        detection.class_name
                    );
                    continue;
                };
                flat.extend_from_slice(&detection.bbox.to_array());
                flat.extend(one_hot);
                rows += 1;
            }
            if rows == 0 {
                continue;
            }
            let image_data = Array2::from_shape_vec((rows, width), flat)?;
            data.insert(format!("{}.png", annotation.filename), image_data);
        }

        Ok(data)
    }
}

fn require_dir(root: &Path, name: &'static str) -> Result<PathBuf> {
    let dir = root.join(name);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(DatasetError::MissingDirectory {
            name,
            root: root.to_path_buf(),
        })
    }
}
