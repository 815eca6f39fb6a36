use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, bail};
use nalgebra::Point3;

/// Vertex positions of a Wavefront OBJ file. Faces, normals and materials
/// are ignored.
pub fn load_obj_vertices(path: &Path) -> Result<Vec<Point3<f64>>> {
    let file = File::open(path).with_context(|| format!("opening mesh {}", path.display()))?;
    let mut vertices = Vec::new();

    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let mut fields = line.split_whitespace();
        if fields.next() != Some("v") {
            continue;
        }
        let coords: Vec<f64> = fields
            .take(3)
            .map(str::parse)
            .collect::<Result<_, _>>()
            .with_context(|| format!("{}:{}: bad vertex", path.display(), n + 1))?;
        if coords.len() != 3 {
            bail!("{}:{}: vertex needs 3 coordinates", path.display(), n + 1);
        }
        vertices.push(Point3::new(coords[0], coords[1], coords[2]));
    }

    if vertices.is_empty() {
        bail!("mesh {} has no vertices", path.display());
    }
    Ok(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_vertices_and_skips_other_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.obj");
        fs::write(
            &path,
            "# comment\nmtllib m.mtl\nv 0 0 0\nv 1.5 -2 3 1.0\nvn 0 0 1\nvt 0.5 0.5\nf 1 2 1\n",
        )
        .unwrap();

        let v = load_obj_vertices(&path).unwrap();
        assert_eq!(v, vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.5, -2.0, 3.0)]);
    }

    #[test]
    fn malformed_vertex_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.obj");
        fs::write(&path, "v 0 zero 0\n").unwrap();
        assert!(load_obj_vertices(&path).is_err());

        fs::write(&path, "v 0 1\n").unwrap();
        assert!(load_obj_vertices(&path).is_err());
    }
}
