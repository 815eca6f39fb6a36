//! Per-image XML annotations.
//!
//! One file per rendered image:
//!
//! ```xml
//! <annotation>
//!     <folder>CLARA2017</folder>
//!     <filename>detection_data/0</filename>
//!     <size><width>128</width><height>128</height><depth>3</depth></size>
//!     <object>
//!         <name>car</name>
//!         <difficult>0</difficult>
//!         <bndbox><xmin>0.1</xmin><ymin>0.2</ymin><xmax>0.3</xmax><ymax>0.4</ymax></bndbox>
//!     </object>
//! </annotation>
//! ```
//!
//! Coordinates are written with a decimal point (`0.0`, `1.0`). On read only
//! `filename` and each object's `name` and `bndbox` are required.

use std::{fs, path::Path};

use projector::BoundingBox;
use quick_xml::se::Serializer;
use serde::{Deserialize, Serialize};

use crate::{DatasetError, Result};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" ?>\n";
const INDENT: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl ImageShape {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_name: String,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_name: impl Into<String>) -> Self {
        Self {
            bbox,
            class_name: class_name.into(),
        }
    }
}

/// Everything written for one image. Detections keep insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageAnnotation {
    pub folder: String,
    pub filename: String,
    pub shape: ImageShape,
    pub detections: Vec<Detection>,
}

impl ImageAnnotation {
    pub fn new(
        folder: impl Into<String>,
        filename: impl Into<String>,
        shape: ImageShape,
        detections: Vec<Detection>,
    ) -> Self {
        Self {
            folder: folder.into(),
            filename: filename.into(),
            shape,
            detections,
        }
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut xml = String::from(XML_DECLARATION);
        let mut ser = Serializer::new(&mut xml);
        ser.indent(' ', INDENT);
        AnnotationDoc::from(self).serialize(ser)?;
        xml.push('\n');
        Ok(xml)
    }

    /// Parses a document written by [`ImageAnnotation::to_xml_string`].
    /// Every object is kept, whatever its class.
    pub fn from_xml_str(xml: &str) -> Result<Self> {
        let doc: AnnotationDoc = quick_xml::de::from_str(xml)?;
        Ok(doc.into())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_xml_string()?)?;
        Ok(())
    }
}

/// Writes one annotation file from parallel box and class-name slices.
pub fn write_xml<S: AsRef<str>>(
    path: &Path,
    folder: &str,
    filename: &str,
    shape: ImageShape,
    boxes: &[BoundingBox],
    names: &[S],
) -> Result<()> {
    if boxes.len() != names.len() {
        return Err(DatasetError::LengthMismatch {
            boxes: boxes.len(),
            names: names.len(),
        });
    }
    let detections = boxes
        .iter()
        .zip(names)
        .map(|(bbox, name)| Detection::new(*bbox, name.as_ref()))
        .collect();
    ImageAnnotation::new(folder, filename, shape, detections).write(path)
}

pub fn read_annotation(path: &Path) -> Result<ImageAnnotation> {
    let xml = fs::read_to_string(path)?;
    ImageAnnotation::from_xml_str(&xml).map_err(|e| match e {
        DatasetError::Deserialize(source) => DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "annotation")]
struct AnnotationDoc {
    #[serde(default)]
    folder: String,
    filename: String,
    #[serde(default)]
    size: ImageShape,
    #[serde(rename = "object", default)]
    objects: Vec<ObjectDoc>,
}

#[derive(Serialize, Deserialize)]
struct ObjectDoc {
    name: String,
    #[serde(default)]
    difficult: u8,
    bndbox: BndBoxDoc,
}

#[derive(Serialize, Deserialize)]
struct BndBoxDoc {
    #[serde(serialize_with = "decimal")]
    xmin: f64,
    #[serde(serialize_with = "decimal")]
    ymin: f64,
    #[serde(serialize_with = "decimal")]
    xmax: f64,
    #[serde(serialize_with = "decimal")]
    ymax: f64,
}

/// `{:?}` keeps the fractional part on whole numbers and is still the
/// shortest form that parses back to the same value.
fn decimal<S: serde::Serializer>(v: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{v:?}"))
}

impl From<&ImageAnnotation> for AnnotationDoc {
    fn from(a: &ImageAnnotation) -> Self {
        Self {
            folder: a.folder.clone(),
            filename: a.filename.clone(),
            size: a.shape,
            objects: a
                .detections
                .iter()
                .map(|d| ObjectDoc {
                    name: d.class_name.clone(),
                    difficult: 0,
                    bndbox: BndBoxDoc {
                        xmin: d.bbox.x_min,
                        ymin: d.bbox.y_min,
                        xmax: d.bbox.x_max,
                        ymax: d.bbox.y_max,
                    },
                })
                .collect(),
        }
    }
}

impl From<AnnotationDoc> for ImageAnnotation {
    fn from(doc: AnnotationDoc) -> Self {
        let detections = doc
            .objects
            .into_iter()
            .map(|o| {
                let b = o.bndbox;
                Detection::new(BoundingBox::new(b.xmin, b.ymin, b.xmax, b.ymax), o.name)
            })
            .collect();
        Self::new(doc.folder, doc.filename, doc.size, detections)
    }
}
