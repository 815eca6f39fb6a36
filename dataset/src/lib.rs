use std::path::PathBuf;

pub mod annotation;
pub mod index;
pub mod parser;
pub mod vocabulary;

pub use annotation::{Detection, ImageAnnotation, ImageShape, read_annotation, write_xml};
pub use index::{DatasetIndex, FlatDatasetManager, OffsetDatasetManager, OffsetTable};
pub use parser::AnnotationParser;
pub use vocabulary::ClassVocabulary;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("'{name}' directory not found inside {root}")]
    MissingDirectory { name: &'static str, root: PathBuf },
    #[error("class '{0}' appears more than once in the vocabulary")]
    DuplicateClass(String),
    #[error("{boxes} boxes but {names} class names")]
    LengthMismatch { boxes: usize, names: usize },
    #[error("failed to parse annotation {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },
    #[error(transparent)]
    Deserialize(#[from] quick_xml::DeError),
    #[error(transparent)]
    Serialize(#[from] quick_xml::SeError),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;
