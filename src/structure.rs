// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Structure readers for the command line tool.
//!
//! Multi-frame XYZ (with the extended-XYZ `Lattice="..."` comment for periodic frames) and PDB
//! (one frame per `MODEL`, periodic when a `CRYST1` record is present).  Frames of different
//! sizes are padded into one batch.

use crate::{device::Device, tensor::Tensor};
use common::{CellError, PeriodicCell};
use periodic_table::Element;
use std::{fmt, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("unrecognised structure format {0:?} (expected .xyz or .pdb)")]
    Format(String),
    #[error("no atoms found")]
    Empty,
    #[error("either every frame or no frame must carry a periodic cell")]
    MixedCells,
    #[error(transparent)]
    Cell(#[from] CellError),
}

impl StructureError {
    fn parse(line: usize, reason: impl fmt::Display) -> Self {
        Self::Parse {
            line: line + 1,
            reason: reason.to_string(),
        }
    }
}

/// One molecule or periodic snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub elements: Vec<Element>,
    pub positions: Vec<[f32; 3]>,
    pub cell: Option<PeriodicCell>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Padded batch tensors for a set of frames.
#[derive(Debug, Clone)]
pub struct BatchedFrames {
    /// `(batch, max_atoms, 3)`
    pub coordinates: Tensor<f32>,
    /// `(batch, max_atoms)`, zero for padding.
    pub charges: Tensor<f32>,
    /// `(batch,)`
    pub natom_counts: Tensor<i32>,
    pub cells: Option<Vec<PeriodicCell>>,
}

/// Reads every frame of an `.xyz` or `.pdb` file.
pub fn read(path: impl AsRef<Path>) -> Result<Vec<Frame>, StructureError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let content = std::fs::read_to_string(path)?;
    let frames = match extension.as_str() {
        "xyz" | "extxyz" => parse_xyz(&content)?,
        "pdb" | "ent" => parse_pdb(&content)?,
        _ => return Err(StructureError::Format(extension)),
    };
    log::info!("read {} frames from {}", frames.len(), path.display());
    Ok(frames)
}

/// Pads `frames` to the largest frame and stacks them.
pub fn batch(frames: &[Frame], device: Device) -> Result<BatchedFrames, StructureError> {
    let nbatch = frames.len();
    let natoms = frames.iter().map(Frame::len).max().unwrap_or(0);
    let mut coordinates = Tensor::zeros(&[nbatch, natoms, 3], device);
    let mut charges = Tensor::zeros(&[nbatch, natoms], device);
    for (b, frame) in frames.iter().enumerate() {
        for (i, (element, position)) in frame.elements.iter().zip(&frame.positions).enumerate() {
            charges.set(&[b, i], element.atomic_number() as f32);
            for (axis, &x) in position.iter().enumerate() {
                coordinates.set(&[b, i, axis], x);
            }
        }
    }
    let natom_counts = Tensor::vector(frames.iter().map(|f| f.len() as i32).collect(), device);

    let cells = frames.iter().map(|f| f.cell).collect::<Option<Vec<_>>>();
    if cells.is_none() && frames.iter().any(|f| f.cell.is_some()) {
        return Err(StructureError::MixedCells);
    }

    Ok(BatchedFrames {
        coordinates,
        charges,
        natom_counts,
        cells,
    })
}

fn element(token: &str) -> Option<Element> {
    match token.parse::<u8>() {
        Ok(number) => Element::from_atomic_number(number),
        Err(_) => Element::from_symbol(token),
    }
}

pub fn parse_xyz(content: &str) -> Result<Vec<Frame>, StructureError> {
    let lines = content.lines().collect::<Vec<_>>();
    let mut frames = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let header = lines[index].trim();
        if header.is_empty() {
            index += 1;
            continue;
        }
        let count: usize = header.parse().map_err(|_| {
            StructureError::parse(index, format!("expected an atom count, found {header:?}"))
        })?;
        let comment = lines
            .get(index + 1)
            .ok_or_else(|| StructureError::parse(index, "missing comment line"))?;
        let cell = lattice(comment, index + 1)?;
        let available = lines.len() - (index + 2).min(lines.len());
        if count > available {
            return Err(StructureError::parse(
                index,
                format!("frame ends early: {count} atoms announced, {available} lines follow"),
            ));
        }

        let mut frame = Frame {
            elements: Vec::with_capacity(count),
            positions: Vec::with_capacity(count),
            cell,
        };
        for line_idx in index + 2..index + 2 + count {
            let line = lines[line_idx];
            let mut fields = line.split_whitespace();
            let symbol = fields.next().unwrap_or("");
            let element = element(symbol).ok_or_else(|| {
                StructureError::parse(line_idx, format!("unknown element {symbol:?}"))
            })?;
            let mut position = [0.0f32; 3];
            for x in position.iter_mut() {
                *x = fields
                    .next()
                    .and_then(|f| f.parse().ok())
                    .ok_or_else(|| StructureError::parse(line_idx, "expected three coordinates"))?;
            }
            frame.elements.push(element);
            frame.positions.push(position);
        }
        frames.push(frame);
        index += 2 + count;
    }

    if frames.iter().all(Frame::is_empty) {
        return Err(StructureError::Empty);
    }
    Ok(frames)
}

/// The `Lattice="ax ay az bx by bz cx cy cz"` key of an extended-XYZ comment line.
fn lattice(comment: &str, line: usize) -> Result<Option<PeriodicCell>, StructureError> {
    let Some(start) = comment.find("Lattice=\"") else {
        return Ok(None);
    };
    let rest = &comment[start + "Lattice=\"".len()..];
    let end = rest
        .find('"')
        .ok_or_else(|| StructureError::parse(line, "unterminated Lattice value"))?;
    let values = rest[..end]
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StructureError::parse(line, format!("Lattice: {e}")))?;
    let [ax, ay, az, bx, by, bz, cx, cy, cz] = values[..] else {
        return Err(StructureError::parse(
            line,
            format!("Lattice needs 9 numbers, found {}", values.len()),
        ));
    };
    Ok(Some(PeriodicCell::new([[ax, ay, az], [bx, by, bz], [cx, cy, cz]])?))
}

/// Extract and trim a column range from a PDB line.
///
/// Column indices are 0-based (PDB columns are 1-based, so subtract 1).
fn column(line: &str, start: usize, end: usize) -> Result<&str, &'static str> {
    line.get(start..end).map(str::trim).ok_or("line too short")
}

fn number<T: std::str::FromStr>(
    line: &str,
    start: usize,
    end: usize,
    what: &'static str,
) -> Result<T, &'static str> {
    column(line, start, end)?.parse().map_err(|_| what)
}

/// Parse an ATOM or HETATM record.
///
/// PDB column layout (1-indexed → 0-indexed):
///   13-16 → 12..16  Atom name (used as element fallback)
///   31-38 → 30..38  X coordinate (8.3 format)
///   39-46 → 38..46  Y coordinate (8.3 format)
///   47-54 → 46..54  Z coordinate (8.3 format)
///   77-78 → 76..78  Element symbol (if present, preferred)
fn parse_atom_record(line: &str) -> Result<(Element, [f32; 3]), &'static str> {
    // Prefer the element symbol at columns 77-78 if present; fall back to the first letter of the
    // atom name ("CA", "OXT", "1HB").
    let symbol = line
        .get(76..78)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            line.get(12..16)
                .and_then(|name| name.chars().find(char::is_ascii_alphabetic))
                .map(String::from)
        })
        .unwrap_or_default();
    let element = Element::from_symbol(&symbol).ok_or("unknown element")?;

    let x = number(line, 30, 38, "invalid X coordinate")?;
    let y = number(line, 38, 46, "invalid Y coordinate")?;
    let z = number(line, 46, 54, "invalid Z coordinate")?;
    Ok((element, [x, y, z]))
}

/// Parse a CRYST1 record into lattice vectors, `a` along x and `b` in the xy plane.
///
/// PDB column layout (1-indexed → 0-indexed):
///    7-15 →  6..15  a
///   16-24 → 15..24  b
///   25-33 → 24..33  c
///   34-40 → 33..40  alpha
///   41-47 → 40..47  beta
///   48-54 → 47..54  gamma
fn parse_cryst1_record(line: &str) -> Result<Option<[[f64; 3]; 3]>, &'static str> {
    let a: f64 = number(line, 6, 15, "invalid a")?;
    let b: f64 = number(line, 15, 24, "invalid b")?;
    let c: f64 = number(line, 24, 33, "invalid c")?;
    let alpha = number::<f64>(line, 33, 40, "invalid alpha")?.to_radians();
    let beta = number::<f64>(line, 40, 47, "invalid beta")?.to_radians();
    let gamma = number::<f64>(line, 47, 54, "invalid gamma")?.to_radians();

    // A unit cube is the conventional placeholder for non-crystallographic entries.
    if a == 1.0 && b == 1.0 && c == 1.0 {
        return Ok(None);
    }

    let cx = c * beta.cos();
    let cy = c * (alpha.cos() - beta.cos() * gamma.cos()) / gamma.sin();
    let cz = (c * c - cx * cx - cy * cy).max(0.0).sqrt();
    Ok(Some([
        [a, 0.0, 0.0],
        [b * gamma.cos(), b * gamma.sin(), 0.0],
        [cx, cy, cz],
    ]))
}

pub fn parse_pdb(content: &str) -> Result<Vec<Frame>, StructureError> {
    let mut lattice = None;
    let mut frames = Vec::new();
    let mut current = (Vec::new(), Vec::new());

    for (line_idx, line) in content.lines().enumerate() {
        let record = line.get(..6).unwrap_or(line).trim_end();
        match record {
            "CRYST1" => {
                lattice =
                    parse_cryst1_record(line).map_err(|e| StructureError::parse(line_idx, e))?;
            }
            "ATOM" | "HETATM" => {
                let (element, position) =
                    parse_atom_record(line).map_err(|e| StructureError::parse(line_idx, e))?;
                current.0.push(element);
                current.1.push(position);
            }
            "ENDMDL" => frames.push(std::mem::take(&mut current)),
            _ => {}
        }
    }
    if !current.0.is_empty() {
        frames.push(current);
    }
    if frames.iter().all(|(elements, _)| elements.is_empty()) {
        return Err(StructureError::Empty);
    }

    let cell = lattice.map(PeriodicCell::new).transpose()?;
    Ok(frames
        .into_iter()
        .map(|(elements, positions)| Frame {
            elements,
            positions,
            cell,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultraviolet::DVec3;

    const WATER_XYZ: &str = "3
water
O 0.000 0.000 0.117
H 0.000 0.757 -0.467
H 0.000 -0.757 -0.467
2
hydrogen molecule Lattice=\"10 0 0 0 10 0 0 0 10\" pbc=\"T T T\"
1 0.0 0.0 0.0
1 0.0 0.0 0.74
";

    #[test]
    fn xyz_frames_and_lattices() {
        let frames = parse_xyz(WATER_XYZ).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0].elements,
            vec![Element::Oxygen, Element::Hydrogen, Element::Hydrogen]
        );
        assert_eq!(frames[0].positions[1], [0.0, 0.757, -0.467]);
        assert!(frames[0].cell.is_none());
        assert_eq!(frames[1].elements, vec![Element::Hydrogen; 2]);
        let cell = frames[1].cell.as_ref().unwrap();
        assert_eq!(cell.lattice().cols[2], DVec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn truncated_xyz_is_an_error() {
        let err = parse_xyz("3\ncomment\nO 0 0 0\n").unwrap_err();
        assert!(matches!(err, StructureError::Parse { line: 4, .. }), "{err}");
    }

    #[test]
    fn xyz_rejects_unknown_elements() {
        assert!(parse_xyz("1\n\nQq 0 0 0\n").is_err());
    }

    #[test]
    fn batching_pads_smaller_frames() {
        let mut frames = parse_xyz(WATER_XYZ).unwrap();
        frames[1].cell = None;
        let batch = batch(&frames, Device::Host).unwrap();
        assert_eq!(batch.coordinates.shape(), &[2, 3, 3]);
        assert_eq!(batch.charges.data(), &[8.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
        assert_eq!(batch.natom_counts.data(), &[3, 2]);
        assert!(batch.cells.is_none());
    }

    #[test]
    fn mixed_cells_cannot_be_batched() {
        let frames = parse_xyz(WATER_XYZ).unwrap();
        assert!(batch(&frames, Device::Host).is_err());
    }

    #[test]
    fn pdb_atom_records() {
        let pdb = "\
CRYST1    1.000    1.000    1.000  90.00  90.00  90.00 P 1           1
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00
HETATM    3  O   HOH A   2       1.000   2.000   3.000  1.00  0.00           O
END
";
        let frames = parse_pdb(pdb).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].elements,
            vec![Element::Nitrogen, Element::Carbon, Element::Oxygen]
        );
        assert_eq!(frames[0].positions[2], [1.0, 2.0, 3.0]);
        assert!(frames[0].cell.is_none());
    }

    #[test]
    fn pdb_models_and_crystal_cell() {
        let pdb = "\
CRYST1   20.000   20.000   20.000  90.00  90.00  90.00 P 1           1
MODEL        1
ATOM      1  O   HOH A   1       0.000   0.000   0.000  1.00  0.00           O
ENDMDL
MODEL        2
ATOM      1  O   HOH A   1       0.500   0.000   0.000  1.00  0.00           O
ENDMDL
";
        let frames = parse_pdb(pdb).unwrap();
        assert_eq!(frames.len(), 2);
        let lattice = frames[1].cell.as_ref().unwrap().lattice();
        assert_eq!(lattice.cols[0], DVec3::new(20.0, 0.0, 0.0));
        assert!(lattice.cols[1].x.abs() < 1e-12);
        assert!((lattice.cols[2].z - 20.0).abs() < 1e-12);
    }

    #[test]
    fn oversized_atom_count_is_a_parse_error() {
        let err = parse_xyz("1000000000000000000\ncomment\nO 0 0 0\n").unwrap_err();
        match err {
            StructureError::Parse { line, ref reason } => {
                assert_eq!(line, 1);
                assert!(reason.contains("ends early"), "{reason}");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(matches!(
            parse_xyz("2\ncomment\nO 0 0 0\n"),
            Err(StructureError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn pdb_without_atoms_is_empty() {
        assert!(matches!(parse_pdb("END\n"), Err(StructureError::Empty)));
    }
}

// End of File
