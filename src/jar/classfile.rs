//! Minimal class-file decoder.
//!
//! Decodes just what dependency indexing needs: the magic, the constant
//! pool, class access flags and name, and the name/flags of every field and
//! method. Code, debug tables, frames and all other attributes are skipped
//! wholesale.

use crate::error::ClassFileError;

pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ENUM: u16 = 0x4000;

type Result<T> = std::result::Result<T, ClassFileError>;

/// Decoded surface of one class file.
#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub access_flags: u16,
    /// Binary name with dots, e.g. `com.example.Foo$Bar`.
    pub name: String,
    pub fields: Vec<MemberSummary>,
    pub methods: Vec<MemberSummary>,
}

#[derive(Debug, Clone)]
pub struct MemberSummary {
    pub access_flags: u16,
    pub name: String,
}

impl MemberSummary {
    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }
}

impl ClassSummary {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFE_BABE {
            return Err(ClassFileError::InvalidMagic(magic));
        }
        let _minor = reader.read_u2()?;
        let _major = reader.read_u2()?;

        let pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let name = pool.class_name(this_class)?.replace('/', ".");
        let _super_class = reader.read_u2()?;

        let interfaces_count = reader.read_u2()?;
        for _ in 0..interfaces_count {
            reader.read_u2()?;
        }

        let fields = parse_members(&mut reader, &pool)?;
        let methods = parse_members(&mut reader, &pool)?;

        Ok(Self {
            access_flags,
            name,
            fields,
            methods,
        })
    }
}

fn parse_members(reader: &mut Reader<'_>, pool: &ConstantPool) -> Result<Vec<MemberSummary>> {
    let count = reader.read_u2()? as usize;
    let mut members = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let access_flags = reader.read_u2()?;
        let name_index = reader.read_u2()?;
        let _descriptor_index = reader.read_u2()?;
        skip_attributes(reader)?;
        members.push(MemberSummary {
            access_flags,
            name: pool.utf8(name_index)?.to_string(),
        });
    }
    Ok(members)
}

fn skip_attributes(reader: &mut Reader<'_>) -> Result<()> {
    let count = reader.read_u2()?;
    for _ in 0..count {
        let _name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}

/// Constant pool with only the entries member decoding needs resolved.
struct ConstantPool {
    entries: Vec<PoolEntry>,
}

enum PoolEntry {
    Utf8(String),
    Class(u16),
    Other,
    /// Longs and doubles occupy two slots; the second is this placeholder.
    Tombstone,
}

impl ConstantPool {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(PoolEntry::Tombstone); // Index 0 is unused.

        let mut i = 1;
        while i < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    let text = String::from_utf8(bytes.to_vec())
                        .map_err(|_| ClassFileError::InvalidUtf8)?;
                    PoolEntry::Utf8(text)
                }
                7 => PoolEntry::Class(reader.read_u2()?),
                3 | 4 => {
                    reader.skip(4)?;
                    PoolEntry::Other
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(PoolEntry::Other);
                    entries.push(PoolEntry::Tombstone);
                    i += 2;
                    continue;
                }
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    PoolEntry::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    PoolEntry::Other
                }
                15 => {
                    reader.skip(3)?;
                    PoolEntry::Other
                }
                _ => return Err(ClassFileError::UnexpectedConstantTag(u16::from(tag))),
            };
            entries.push(entry);
            i += 1;
        }
        Ok(Self { entries })
    }

    fn utf8(&self, index: u16) -> Result<&str> {
        match self.entries.get(index as usize) {
            Some(PoolEntry::Utf8(text)) => Ok(text),
            Some(_) => Err(ClassFileError::UnexpectedConstantTag(index)),
            None => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str> {
        match self.entries.get(index as usize) {
            Some(PoolEntry::Class(name_index)) => self.utf8(*name_index),
            Some(_) => Err(ClassFileError::UnexpectedConstantTag(index)),
            None => Err(ClassFileError::BadConstantIndex(index)),
        }
    }
}

/// Byte cursor over a class file.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_u1(&mut self) -> Result<u8> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or(ClassFileError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u2(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u4(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(ClassFileError::UnexpectedEof)?;
        if end > self.bytes.len() {
            return Err(ClassFileError::UnexpectedEof);
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Assemble a tiny, valid class file for tests: one class with the given
    /// access flags, fields and methods (flags + name each).
    pub fn build_class(
        class_name: &str,
        access_flags: u16,
        fields: &[(u16, &str)],
        methods: &[(u16, &str)],
    ) -> Vec<u8> {
        let mut pool: Vec<Vec<u8>> = Vec::new();
        let mut utf8 = |text: &str| -> u16 {
            let mut entry = vec![1u8];
            entry.extend((text.len() as u16).to_be_bytes());
            entry.extend(text.as_bytes());
            pool.push(entry);
            pool.len() as u16
        };

        let class_utf8 = utf8(class_name);
        let desc_utf8 = utf8("()V");
        let field_desc_utf8 = utf8("I");
        let member_names: Vec<u16> = fields
            .iter()
            .chain(methods.iter())
            .map(|(_, name)| utf8(name))
            .collect();

        let mut class_entry = vec![7u8];
        class_entry.extend(class_utf8.to_be_bytes());
        pool.push(class_entry);
        let class_index = pool.len() as u16;

        let mut out = Vec::new();
        out.extend(0xCAFE_BABE_u32.to_be_bytes());
        out.extend(0u16.to_be_bytes()); // minor
        out.extend(52u16.to_be_bytes()); // major (Java 8)
        out.extend((pool.len() as u16 + 1).to_be_bytes());
        for entry in &pool {
            out.extend(entry);
        }
        out.extend(access_flags.to_be_bytes());
        out.extend(class_index.to_be_bytes());
        out.extend(0u16.to_be_bytes()); // super
        out.extend(0u16.to_be_bytes()); // interfaces

        out.extend((fields.len() as u16).to_be_bytes());
        for (i, (flags, _)) in fields.iter().enumerate() {
            out.extend(flags.to_be_bytes());
            out.extend(member_names[i].to_be_bytes());
            out.extend(field_desc_utf8.to_be_bytes());
            out.extend(0u16.to_be_bytes()); // attributes
        }

        out.extend((methods.len() as u16).to_be_bytes());
        for (i, (flags, _)) in methods.iter().enumerate() {
            out.extend(flags.to_be_bytes());
            out.extend(member_names[fields.len() + i].to_be_bytes());
            out.extend(desc_utf8.to_be_bytes());
            out.extend(0u16.to_be_bytes()); // attributes
        }

        out.extend(0u16.to_be_bytes()); // class attributes
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::build_class;
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let bytes = build_class(
            "com/example/Foo",
            ACC_ENUM,
            &[(0, "count"), (ACC_SYNTHETIC, "$meta")],
            &[(0, "<init>"), (ACC_SYNTHETIC, "access$000")],
        );
        let class = ClassSummary::parse(&bytes).unwrap();
        assert_eq!(class.name, "com.example.Foo");
        assert_ne!(class.access_flags & ACC_ENUM, 0);
        assert_eq!(class.fields.len(), 2);
        assert!(class.fields[1].is_synthetic());
        assert_eq!(class.methods[0].name, "<init>");
        assert!(class.methods[1].is_synthetic());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let err = ClassSummary::parse(&[0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err, ClassFileError::InvalidMagic(0));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let mut bytes = build_class("A", 0, &[], &[]);
        bytes.truncate(bytes.len() - 3);
        assert_eq!(
            ClassSummary::parse(&bytes).unwrap_err(),
            ClassFileError::UnexpectedEof
        );
    }
}
