//! R1CS binary container reader
//!
//! Little-endian reader for the circom `.r1cs` layout: a `"r1cs"` magic,
//! a version word, and typed sections that may appear in **any order**
//! within the file. We index the sections first, then decode the header
//! (which fixes the coefficient width), then the constraints and the
//! wire↔label map. Unknown section types are skipped by their recorded
//! size.
//!
//! Failure policy: truncated or malformed input returns an error to the
//! caller with no partial state.

/// Magic bytes opening every container.
pub const R1CS_MAGIC: [u8; 4] = *b"r1cs";

/// The only container version we read.
pub const R1CS_VERSION: u32 = 1;

const SECTION_HEADER: u32 = 0x1;
const SECTION_CONSTRAINTS: u32 = 0x2;
const SECTION_WIRE_MAP: u32 = 0x3;

/// Errors surfaced by the reader.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum R1csError {
    /// The file does not start with `"r1cs"`.
    #[error("bad magic bytes (expected \"r1cs\")")]
    BadMagic,
    /// Unknown container version.
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),
    /// The input ended inside a field that was being read.
    #[error("input truncated")]
    Truncated,
    /// A section type occurred more than once.
    #[error("section type {0:#x} appears twice")]
    DuplicateSection(u32),
    /// A required section is absent.
    #[error("missing required section: {0}")]
    MissingSection(&'static str),
    /// A section's payload was not fully consumed by its decoder.
    #[error("section type {0:#x} has trailing payload bytes")]
    TrailingSectionBytes(u32),
}

/// Decoded header section: field modulus, wire counts, label and
/// constraint counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R1csHeader {
    /// Prime modulus, little-endian; its length is the coefficient width.
    pub modulus: Vec<u8>,
    /// Total number of wires including the constant-one wire 0.
    pub num_wires: u32,
    /// Public output wires (starting at index 1).
    pub num_public_outputs: u32,
    /// Public input wires (following the outputs).
    pub num_public_inputs: u32,
    /// Private input wires (following the public inputs).
    pub num_private_inputs: u32,
    /// Total number of signal labels.
    pub num_labels: u64,
    /// Number of constraints in the constraints section.
    pub num_constraints: u32,
}

impl R1csHeader {
    /// Width in bytes of every serialized coefficient.
    pub fn field_size(&self) -> usize {
        self.modulus.len()
    }
}

/// One linear-combination term `coefficient · wire`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    /// Wire index.
    pub wire_id: u32,
    /// Coefficient, little-endian, `field_size` bytes.
    pub coefficient: Vec<u8>,
}

/// One rank-1 constraint `⟨A, w⟩ · ⟨B, w⟩ = ⟨C, w⟩`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Terms of the `A` combination.
    pub a: Vec<Term>,
    /// Terms of the `B` combination.
    pub b: Vec<Term>,
    /// Terms of the `C` combination.
    pub c: Vec<Term>,
}

/// A fully decoded `.r1cs` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R1csFile {
    /// Header section.
    pub header: R1csHeader,
    /// Constraints section, `header.num_constraints` entries.
    pub constraints: Vec<Constraint>,
    /// Wire→label map, one `u64` per wire.
    pub wire_to_label: Vec<u64>,
}

impl R1csFile {
    /// Decode a container from a byte slice.
    pub fn read(bytes: &[u8]) -> Result<Self, R1csError> {
        let mut cur = Cursor::new(bytes);

        if cur.read_exact(4)? != R1CS_MAGIC {
            return Err(R1csError::BadMagic);
        }
        let version = cur.read_u32()?;
        if version != R1CS_VERSION {
            return Err(R1csError::UnsupportedVersion(version));
        }
        let num_sections = cur.read_u32()?;

        // Index the sections first; the payload order is unconstrained.
        let mut header_payload: Option<&[u8]> = None;
        let mut constraints_payload: Option<&[u8]> = None;
        let mut wire_map_payload: Option<&[u8]> = None;
        for _ in 0..num_sections {
            let section_type = cur.read_u32()?;
            let size = cur.read_u64()?;
            let payload = cur.read_exact(usize::try_from(size).map_err(|_| R1csError::Truncated)?)?;
            let slot = match section_type {
                SECTION_HEADER => &mut header_payload,
                SECTION_CONSTRAINTS => &mut constraints_payload,
                SECTION_WIRE_MAP => &mut wire_map_payload,
                _ => continue, // unknown sections are skipped by size
            };
            if slot.replace(payload).is_some() {
                return Err(R1csError::DuplicateSection(section_type));
            }
        }

        let header = read_header(header_payload.ok_or(R1csError::MissingSection("header"))?)?;
        let constraints = read_constraints(
            constraints_payload.ok_or(R1csError::MissingSection("constraints"))?,
            &header,
        )?;
        let wire_to_label = read_wire_map(
            wire_map_payload.ok_or(R1csError::MissingSection("wire↔label map"))?,
            &header,
        )?;

        Ok(Self { header, constraints, wire_to_label })
    }
}

fn read_header(payload: &[u8]) -> Result<R1csHeader, R1csError> {
    let mut cur = Cursor::new(payload);
    let field_size = cur.read_u32()? as usize;
    let modulus = cur.read_exact(field_size)?.to_vec();
    let header = R1csHeader {
        modulus,
        num_wires: cur.read_u32()?,
        num_public_outputs: cur.read_u32()?,
        num_public_inputs: cur.read_u32()?,
        num_private_inputs: cur.read_u32()?,
        num_labels: cur.read_u64()?,
        num_constraints: cur.read_u32()?,
    };
    cur.finish(SECTION_HEADER)?;
    Ok(header)
}

fn read_constraints(payload: &[u8], header: &R1csHeader) -> Result<Vec<Constraint>, R1csError> {
    let mut cur = Cursor::new(payload);
    let field_size = header.field_size();

    let mut read_terms = |cur: &mut Cursor<'_>| -> Result<Vec<Term>, R1csError> {
        let n = cur.read_u32()?;
        let mut terms = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let wire_id = cur.read_u32()?;
            let coefficient = cur.read_exact(field_size)?.to_vec();
            terms.push(Term { wire_id, coefficient });
        }
        Ok(terms)
    };

    let mut constraints = Vec::with_capacity(header.num_constraints as usize);
    for _ in 0..header.num_constraints {
        let a = read_terms(&mut cur)?;
        let b = read_terms(&mut cur)?;
        let c = read_terms(&mut cur)?;
        constraints.push(Constraint { a, b, c });
    }
    cur.finish(SECTION_CONSTRAINTS)?;
    Ok(constraints)
}

fn read_wire_map(payload: &[u8], header: &R1csHeader) -> Result<Vec<u64>, R1csError> {
    let mut cur = Cursor::new(payload);
    let mut map = Vec::with_capacity(header.num_wires as usize);
    for _ in 0..header.num_wires {
        map.push(cur.read_u64()?);
    }
    cur.finish(SECTION_WIRE_MAP)?;
    Ok(map)
}

/// Bounds-checked little-endian reader over a byte slice.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], R1csError> {
        let end = self.pos.checked_add(len).ok_or(R1csError::Truncated)?;
        if end > self.bytes.len() {
            return Err(R1csError::Truncated);
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32, R1csError> {
        let b = self.read_exact(4)?;
        Ok(u32::from_le_bytes(b.try_into().expect("4-byte slice")))
    }

    fn read_u64(&mut self) -> Result<u64, R1csError> {
        let b = self.read_exact(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8-byte slice")))
    }

    /// Require the payload to be fully consumed.
    fn finish(&self, section_type: u32) -> Result<(), R1csError> {
        if self.pos != self.bytes.len() {
            return Err(R1csError::TrailingSectionBytes(section_type));
        }
        Ok(())
    }
}
