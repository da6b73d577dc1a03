//! Page Codec: maps a logical byte stream onto fixed-size encrypted pages.
//!
//! Page layout (`page_size` bytes):
//!
//! ```text
//! 0..12         AES-GCM IV
//! 12..28        GCM tag
//! 28..32        payload length (u32, big-endian)
//! 32..H         reserved, zero
//! H..P          ciphertext of the payload, zero-padded to P - H
//! ```
//!
//! The associated data is `page_index || payload_length`, so pages cannot be
//! swapped or have their length altered without failing authentication.
//! Every page but the last carries a full payload; the logical length is
//! therefore `(pages - 1) * (P - H) + last_len`.

use crate::crypto::{PageCipher, AES_IV_SIZE, AES_TAG_SIZE};
use crate::error::{FsError, FsResult, PageError};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default header size in bytes reserved at the front of every page.
pub const DEFAULT_HEADER_SIZE: usize = 93;

/// Largest logical length a stream may reach. Whole payloads are held in
/// memory, so this also bounds a single allocation.
pub const MAX_FILE_SIZE: u64 = 1 << 32;

const TAG_OFFSET: usize = AES_IV_SIZE;
const LEN_OFFSET: usize = TAG_OFFSET + AES_TAG_SIZE;

/// Smallest header that fits IV, tag and length.
pub const MIN_HEADER_SIZE: usize = LEN_OFFSET + 4;

/// Result of merging bytes into stored content.
#[derive(Debug)]
pub struct Spliced {
    /// New stored representation.
    pub content: Vec<u8>,
    /// Logical bytes taken from the input.
    pub written: usize,
    /// Logical length after the merge.
    pub total_len: u64,
}

#[derive(Clone, Debug)]
pub struct PageCodec {
    page_size: usize,
    header_size: usize,
    cipher: PageCipher,
}

impl PageCodec {
    pub fn new(page_size: usize, header_size: usize, cipher: PageCipher) -> FsResult<Self> {
        if header_size < MIN_HEADER_SIZE || header_size >= page_size {
            return Err(FsError::InvalidArgument);
        }
        Ok(Self {
            page_size,
            header_size,
            cipher,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Usable payload bytes per page (`P - H`).
    pub fn payload_size(&self) -> usize {
        self.page_size - self.header_size
    }

    fn page_count(&self, stored: &[u8]) -> Result<u64, PageError> {
        if stored.len() % self.page_size != 0 {
            return Err(PageError::Misaligned(stored.len()));
        }
        Ok((stored.len() / self.page_size) as u64)
    }

    fn page_slice<'a>(&self, stored: &'a [u8], index: u64) -> &'a [u8] {
        let start = index as usize * self.page_size;
        &stored[start..start + self.page_size]
    }

    fn declared_len(&self, page: &[u8], index: u64) -> Result<u32, PageError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&page[LEN_OFFSET..LEN_OFFSET + 4]);
        let len = u32::from_be_bytes(raw);
        if len == 0 || len as usize > self.payload_size() {
            return Err(PageError::BadLength { index, len });
        }
        Ok(len)
    }

    /// Logical length of `stored`, read from the last page header.
    pub fn logical_len(&self, stored: &[u8]) -> Result<u64, PageError> {
        let pages = self.page_count(stored)?;
        if pages == 0 {
            return Ok(0);
        }
        let last = pages - 1;
        let len = self.declared_len(self.page_slice(stored, last), last)?;
        Ok(last * self.payload_size() as u64 + len as u64)
    }

    fn aad(index: u64, len: u32) -> [u8; 12] {
        let mut aad = [0u8; 12];
        aad[..8].copy_from_slice(&index.to_be_bytes());
        aad[8..].copy_from_slice(&len.to_be_bytes());
        aad
    }

    /// Encrypt one page worth of payload (at most `P - H` bytes, at least one).
    fn encode_page(&self, index: u64, payload: &[u8]) -> Result<Vec<u8>, PageError> {
        let len = payload.len() as u32;
        let mut body = vec![0u8; self.payload_size()];
        body[..payload.len()].copy_from_slice(payload);

        let (iv, tag) = self
            .cipher
            .seal_in_place(&Self::aad(index, len), &mut body)
            .map_err(|_| PageError::Encrypt(index))?;

        let mut page = vec![0u8; self.header_size];
        page[..TAG_OFFSET].copy_from_slice(&iv);
        page[TAG_OFFSET..LEN_OFFSET].copy_from_slice(&tag);
        page[LEN_OFFSET..LEN_OFFSET + 4].copy_from_slice(&len.to_be_bytes());
        page.extend_from_slice(&body);
        Ok(page)
    }

    /// Decrypt page `index` and return its logical payload.
    fn decode_page(&self, stored: &[u8], index: u64) -> Result<Vec<u8>, PageError> {
        let page = self.page_slice(stored, index);
        let len = self.declared_len(page, index)?;

        let mut iv = [0u8; AES_IV_SIZE];
        iv.copy_from_slice(&page[..TAG_OFFSET]);
        let mut tag = [0u8; AES_TAG_SIZE];
        tag.copy_from_slice(&page[TAG_OFFSET..LEN_OFFSET]);

        let mut body = page[self.header_size..].to_vec();
        self.cipher
            .open_in_place(&iv, &tag, &Self::aad(index, len), &mut body)
            .map_err(|_| PageError::Decrypt(index))?;
        body.truncate(len as usize);
        Ok(body)
    }

    /// Read up to `size` logical bytes at `offset`, decrypting only the
    /// overlapping pages. Short at end of stream.
    pub fn read(&self, stored: &[u8], offset: u64, size: usize) -> Result<Vec<u8>, PageError> {
        let len = self.logical_len(stored)?;
        if offset >= len || size == 0 {
            return Ok(Vec::new());
        }
        let end = len.min(offset.saturating_add(size as u64));
        let payload = self.payload_size() as u64;

        let mut out = Vec::with_capacity((end - offset) as usize);
        for index in offset / payload..=(end - 1) / payload {
            let page_start = index * payload;
            let plain = self.decode_page(stored, index)?;
            let from = offset.max(page_start) - page_start;
            let to = end.min(page_start + plain.len() as u64) - page_start;
            out.extend_from_slice(&plain[from as usize..to as usize]);
        }
        Ok(out)
    }

    /// Merge `data` into the logical stream at `offset`.
    ///
    /// Gaps past the current end are zero-filled. Pages outside the touched
    /// range are carried over without re-encryption.
    pub fn splice(&self, stored: &[u8], offset: u64, data: &[u8]) -> Result<Spliced, PageError> {
        let old_len = self.logical_len(stored)?;
        if data.is_empty() {
            return Ok(Spliced {
                content: stored.to_vec(),
                written: 0,
                total_len: old_len,
            });
        }

        let payload = self.payload_size() as u64;
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|&end| end <= MAX_FILE_SIZE)
            .ok_or(PageError::TooLarge(offset.saturating_add(data.len() as u64)))?;
        let new_len = old_len.max(end);
        let first = offset.min(old_len) / payload;
        let last = (end - 1) / payload;

        let content = self.rewrite(stored, old_len, new_len, first, last, offset, data)?;
        Ok(Spliced {
            content,
            written: data.len(),
            total_len: new_len,
        })
    }

    /// Shrink or zero-extend the logical stream to `new_len` bytes.
    pub fn truncate(&self, stored: &[u8], new_len: u64) -> Result<Vec<u8>, PageError> {
        if new_len > MAX_FILE_SIZE {
            return Err(PageError::TooLarge(new_len));
        }
        let old_len = self.logical_len(stored)?;
        let payload = self.payload_size() as u64;

        if new_len == old_len {
            return Ok(stored.to_vec());
        }

        if new_len > old_len {
            let first = old_len / payload;
            let last = (new_len - 1) / payload;
            return self.rewrite(stored, old_len, new_len, first, last, new_len, &[]);
        }

        let full_pages = new_len / payload;
        let tail = (new_len % payload) as usize;
        let mut out = stored[..full_pages as usize * self.page_size].to_vec();
        if tail > 0 {
            let plain = self.decode_page(stored, full_pages)?;
            out.extend(self.encode_page(full_pages, &plain[..tail])?);
        }
        Ok(out)
    }

    /// Re-encode pages `first..=last` of a stream growing from `old_len` to
    /// `new_len`, overlaying `data` at `data_offset`. Pages before `first` and
    /// old pages after `last` are copied as-is.
    #[allow(clippy::too_many_arguments)]
    fn rewrite(
        &self,
        stored: &[u8],
        old_len: u64,
        new_len: u64,
        first: u64,
        last: u64,
        data_offset: u64,
        data: &[u8],
    ) -> Result<Vec<u8>, PageError> {
        let payload = self.payload_size() as u64;
        let old_pages = self.page_count(stored)?;
        let data_end = data_offset + data.len() as u64;

        let capacity = usize::try_from(new_len.div_ceil(payload))
            .ok()
            .and_then(|pages| pages.checked_mul(self.page_size))
            .ok_or(PageError::TooLarge(new_len))?;
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&stored[..first as usize * self.page_size]);

        for index in first..=last {
            let page_start = index * payload;
            let page_end = (page_start + payload).min(new_len);

            let mut plain = if index < old_pages {
                self.decode_page(stored, index)?
            } else {
                Vec::new()
            };
            plain.resize((page_end - page_start) as usize, 0);

            let from = data_offset.max(page_start);
            let to = data_end.min(page_end);
            if from < to {
                plain[(from - page_start) as usize..(to - page_start) as usize]
                    .copy_from_slice(&data[(from - data_offset) as usize..(to - data_offset) as usize]);
            }

            out.extend(self.encode_page(index, &plain)?);
        }

        if last + 1 < old_pages {
            out.extend_from_slice(&stored[(last + 1) as usize * self.page_size..]);
        }
        Ok(out)
    }
}
