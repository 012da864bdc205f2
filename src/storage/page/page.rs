use bytes::{Buf, BufMut};

use crate::common::{DbError, PageId, Result, INVALID_PAGE_ID, PAGE_PAYLOAD_SIZE, PAGE_SIZE};

/// Page header layout:
///
/// | Field       | Offset | Size |
/// |-------------|--------|------|
/// | page_type   | 0      | 1    |
/// | reserved    | 1      | 1    |
/// | data_length | 2      | 2    |
/// | next_page   | 4      | 4    |
/// | prev_page   | 8      | 4    |
/// | checksum    | 12     | 4    |
///
/// All multi-byte fields are little-endian. The payload follows at offset 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub reserved: u8,
    pub data_length: u16,
    pub next_page: PageId,
    pub prev_page: PageId,
    pub checksum: u32,
}

/// Kind of content a page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Free,
    Leaf,
    Internal,
    Meta,
    /// A type byte this version does not recognize; kept so that
    /// deserialization never loses information.
    Unknown(u8),
}

impl PageType {
    pub fn as_u8(&self) -> u8 {
        match self {
            PageType::Free => 0,
            PageType::Leaf => 1,
            PageType::Internal => 2,
            PageType::Meta => 3,
            PageType::Unknown(b) => *b,
        }
    }
}

impl From<u8> for PageType {
    fn from(b: u8) -> Self {
        match b {
            0 => PageType::Free,
            1 => PageType::Leaf,
            2 => PageType::Internal,
            3 => PageType::Meta,
            other => PageType::Unknown(other),
        }
    }
}

/// A fixed-size disk page: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    id: PageId,
    header: PageHeader,
    data: Box<[u8; PAGE_PAYLOAD_SIZE]>,
}

impl Page {
    /// Creates an empty page with null chain links.
    pub fn new(id: PageId, page_type: PageType) -> Self {
        Self {
            id,
            header: PageHeader {
                page_type,
                reserved: 0,
                data_length: 0,
                next_page: INVALID_PAGE_ID,
                prev_page: INVALID_PAGE_ID,
                checksum: 0,
            },
            data: Box::new([0u8; PAGE_PAYLOAD_SIZE]),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn page_type(&self) -> PageType {
        self.header.page_type
    }

    pub fn next_page(&self) -> PageId {
        self.header.next_page
    }

    pub fn set_next_page(&mut self, page_id: PageId) {
        self.header.next_page = page_id;
    }

    pub fn prev_page(&self) -> PageId {
        self.header.prev_page
    }

    pub fn set_prev_page(&mut self, page_id: PageId) {
        self.header.prev_page = page_id;
    }

    pub fn checksum(&self) -> u32 {
        self.header.checksum
    }

    pub fn data_length(&self) -> usize {
        self.header.data_length as usize
    }

    /// Replaces the payload. Bytes past the new data are zeroed.
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > PAGE_PAYLOAD_SIZE {
            return Err(DbError::DataTooLarge {
                size: data.len(),
                capacity: PAGE_PAYLOAD_SIZE,
            });
        }

        self.data[..data.len()].copy_from_slice(data);
        self.data[data.len()..].fill(0);
        self.header.data_length = data.len() as u16;
        Ok(())
    }

    /// Returns exactly `data_length` bytes of payload.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_length()]
    }

    pub fn available_space(&self) -> usize {
        PAGE_PAYLOAD_SIZE - self.data_length()
    }

    /// Wrapping sum of the live payload bytes.
    pub fn compute_checksum(&self) -> u32 {
        self.data()
            .iter()
            .fold(0u32, |sum, &b| sum.wrapping_add(b as u32))
    }

    pub fn update_checksum(&mut self) {
        self.header.checksum = self.compute_checksum();
    }

    pub fn verify_checksum(&self) -> Result<()> {
        let computed = self.compute_checksum();
        if computed != self.header.checksum {
            return Err(DbError::ChecksumMismatch {
                page_id: self.id,
                stored: self.header.checksum,
                computed,
            });
        }
        Ok(())
    }

    /// Encodes the page into its fixed on-disk form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.put_u8(self.header.page_type.as_u8());
        buf.put_u8(self.header.reserved);
        buf.put_u16_le(self.header.data_length);
        buf.put_u32_le(self.header.next_page.as_u32());
        buf.put_u32_le(self.header.prev_page.as_u32());
        buf.put_u32_le(self.header.checksum);
        buf.put_slice(&self.data[..]);
        buf
    }

    /// Decodes a page from exactly `PAGE_SIZE` bytes.
    pub fn deserialize(id: PageId, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DbError::InvalidSize {
                got: bytes.len(),
                expected: PAGE_SIZE,
            });
        }

        let mut buf = bytes;
        let page_type = PageType::from(buf.get_u8());
        let reserved = buf.get_u8();
        let data_length = buf.get_u16_le();
        let next_page = PageId::new(buf.get_u32_le());
        let prev_page = PageId::new(buf.get_u32_le());
        let checksum = buf.get_u32_le();

        if data_length as usize > PAGE_PAYLOAD_SIZE {
            return Err(DbError::CorruptPage {
                page_id: id,
                data_length: data_length as usize,
            });
        }

        let mut data = Box::new([0u8; PAGE_PAYLOAD_SIZE]);
        data.copy_from_slice(buf);

        Ok(Self {
            id,
            header: PageHeader {
                page_type,
                reserved,
                data_length,
                next_page,
                prev_page,
                checksum,
            },
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PAGE_HEADER_SIZE;

    #[test]
    fn test_new_page_is_empty() {
        let page = Page::new(PageId::new(3), PageType::Leaf);
        assert_eq!(page.data_length(), 0);
        assert!(page.data().is_empty());
        assert_eq!(page.next_page(), INVALID_PAGE_ID);
        assert_eq!(page.prev_page(), INVALID_PAGE_ID);
        assert_eq!(page.available_space(), PAGE_PAYLOAD_SIZE);
    }

    #[test]
    fn test_set_data_clears_tail() {
        let mut page = Page::new(PageId::new(1), PageType::Leaf);
        page.set_data(&[7u8; 100]).unwrap();
        page.set_data(b"abc").unwrap();
        assert_eq!(page.data(), b"abc");
        assert!(page.data[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_set_data_too_large() {
        let mut page = Page::new(PageId::new(1), PageType::Leaf);
        let err = page.set_data(&vec![0u8; PAGE_PAYLOAD_SIZE + 1]).unwrap_err();
        assert!(matches!(err, DbError::DataTooLarge { size, capacity }
            if size == PAGE_PAYLOAD_SIZE + 1 && capacity == PAGE_PAYLOAD_SIZE));
        page.set_data(&vec![1u8; PAGE_PAYLOAD_SIZE]).unwrap();
        assert_eq!(page.available_space(), 0);
    }

    #[test]
    fn test_header_layout() {
        let mut page = Page::new(PageId::new(9), PageType::Internal);
        page.set_next_page(PageId::new(0x0102_0304));
        page.set_prev_page(PageId::new(5));
        page.set_data(&[1, 2, 3]).unwrap();
        page.update_checksum();

        let bytes = page.serialize();
        assert_eq!(bytes.len(), PAGE_SIZE);
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1], 0);
        assert_eq!(&bytes[2..4], &3u16.to_le_bytes());
        assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[8..12], &5u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &6u32.to_le_bytes());
        assert_eq!(&bytes[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + 3], &[1, 2, 3]);
    }

    #[test]
    fn test_checksum_wraps() {
        let mut page = Page::new(PageId::new(1), PageType::Leaf);
        page.set_data(&vec![0xFF; PAGE_PAYLOAD_SIZE]).unwrap();
        page.update_checksum();
        assert_eq!(page.checksum(), 0xFF * PAGE_PAYLOAD_SIZE as u32);
        assert!(page.verify_checksum().is_ok());
    }
}
