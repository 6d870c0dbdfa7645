use crate::region::Region;

/// Bytes the encoded header takes inside the region: a `next` word and a
/// `flags` word. The slot reserved for it is padded up to the alignment unit,
/// see [`crate::HeapConfig::header_size`].
pub(crate) const HEADER_BYTES: usize = 2 * size_of::<u32>();

/// Offset of the `flags` word inside the header.
const FLAGS_OFFSET: usize = size_of::<u32>();

/// Bit of the `flags` word telling whether the block is handed out.
const IN_USE_BIT: u32 = 0b1;

/// Metadata of a block. Its content is placed right after this header.
///
/// ```text
/// +---------------------+ <------+
/// |   next (u32 off)    |        |
/// +---------------------+        | -> Header (padded to the alignment unit)
/// |   flags (in-use)    |        |
/// +---------------------+ <------+
/// |       Content       |        |
/// |         ...         |        | -> usable size = next header - content
/// |         ...         |        |
/// +---------------------+ <------+ next block header / end of region
/// ```
///
/// There is no size field. The usable size of a block is always derived from
/// where the next header (or the end of the region) starts.
///
/// `next` is stored as the offset of the next header from the start of the
/// region, with `0` meaning "this is the last block". That is unambiguous
/// because the block at offset `0` always heads the chain and is never
/// anybody's successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub next: Option<usize>,
    pub in_use: bool,
}

impl Header {
    /// Header of a free block spanning everything up to the end of the region.
    pub const fn last_free() -> Self {
        Self {
            next: None,
            in_use: false,
        }
    }

    /// Decodes the header stored at `offset`.
    pub fn read(region: &Region, offset: usize) -> Self {
        let next = region.read_u32(offset) as usize;
        let flags = region.read_u32(offset + FLAGS_OFFSET);

        Self {
            next: (next != 0).then_some(next),
            in_use: flags & IN_USE_BIT != 0,
        }
    }

    /// Encodes this header at `offset`.
    pub fn write(self, region: &mut Region, offset: usize) {
        debug_assert!(self.next.is_none_or(|next| next > offset));

        // Region capacity never exceeds `u32::MAX`, see `HeapConfig::validate`.
        let next = self.next.unwrap_or(0) as u32;
        let flags = if self.in_use { IN_USE_BIT } else { 0 };

        region.write_u32(offset, next);
        region.write_u32(offset + FLAGS_OFFSET, flags);
    }
}

/// Tells whether the block at `offset` is handed out.
#[inline]
pub(crate) fn is_in_use(region: &Region, offset: usize) -> bool {
    Header::read(region, offset).in_use
}

#[inline]
pub(crate) fn set_in_use(region: &mut Region, offset: usize) {
    Header {
        in_use: true,
        ..Header::read(region, offset)
    }
    .write(region, offset);
}

#[inline]
pub(crate) fn clear_in_use(region: &mut Region, offset: usize) {
    Header {
        in_use: false,
        ..Header::read(region, offset)
    }
    .write(region, offset);
}

/// Offset of the next block's header, independent of the in-use flag.
#[inline]
pub(crate) fn next(region: &Region, offset: usize) -> Option<usize> {
    Header::read(region, offset).next
}

/// Rewrites where the block at `offset` links to, keeping its flag.
#[inline]
pub(crate) fn set_next(region: &mut Region, offset: usize, next: Option<usize>) {
    Header {
        next,
        ..Header::read(region, offset)
    }
    .write(region, offset);
}

/// Bytes from the block's header to the next header (or the end of the
/// region): header slot plus usable content.
#[inline]
pub(crate) fn span(region: &Region, offset: usize) -> usize {
    next(region, offset).unwrap_or(region.capacity()) - offset
}

/// Usable size of the block at `offset`, derived from the position of the
/// next header.
#[inline]
pub(crate) fn usable_size(region: &Region, offset: usize, header_size: usize) -> usize {
    span(region, offset) - header_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut region = Region::request(256, 8).unwrap();
        let headers = [
            Header::last_free(),
            Header {
                next: Some(64),
                in_use: true,
            },
            Header {
                next: Some(248),
                in_use: false,
            },
        ];

        for header in headers {
            header.write(&mut region, 16);
            assert_eq!(Header::read(&region, 16), header);
        }
    }

    #[test]
    fn flag_does_not_touch_the_link() {
        let mut region = Region::request(256, 8).unwrap();
        Header {
            next: Some(40),
            in_use: false,
        }
        .write(&mut region, 0);

        set_in_use(&mut region, 0);
        assert!(is_in_use(&region, 0));
        assert_eq!(next(&region, 0), Some(40));

        clear_in_use(&mut region, 0);
        assert!(!is_in_use(&region, 0));
        assert_eq!(next(&region, 0), Some(40));

        set_in_use(&mut region, 0);
        set_next(&mut region, 0, None);
        assert!(is_in_use(&region, 0));
        assert_eq!(next(&region, 0), None);
    }

    #[test]
    fn size_is_derived_from_neighbours() {
        let mut region = Region::request(256, 8).unwrap();
        Header {
            next: Some(32),
            in_use: true,
        }
        .write(&mut region, 0);
        Header::last_free().write(&mut region, 32);

        assert_eq!(span(&region, 0), 32);
        assert_eq!(usable_size(&region, 0, 8), 24);
        // The last block reaches the end of the region.
        assert_eq!(usable_size(&region, 32, 8), 256 - 32 - 8);
    }
}
