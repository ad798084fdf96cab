// Shared I/O helpers

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Fill `buf` from `reader` until it is full or the reader is exhausted, so
/// every chunk but the last is exactly `buf.len()` bytes.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Open `path` for reading if it is an existing regular file, returning the
/// handle together with its current length.
pub fn open_regular_file(path: &Path) -> Option<(File, u64)> {
    let file = File::open(path).ok()?;
    let metadata = file.metadata().ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some((file, metadata.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most 100 bytes per call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(100);
            self.0.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_read_chunk_fills_buffer() {
        let mut reader = Trickle(Cursor::new(vec![9u8; 20000]));
        let mut buf = vec![0u8; 8192];

        let mut sizes = Vec::new();
        loop {
            let n = read_chunk(&mut reader, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            sizes.push(n);
        }
        assert_eq!(sizes, vec![8192, 8192, 3616]);
    }

    #[test]
    fn test_open_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"12345").unwrap();

        let (_, len) = open_regular_file(&path).unwrap();
        assert_eq!(len, 5);
        assert!(open_regular_file(dir.path()).is_none());
        assert!(open_regular_file(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_read_chunk_empty_source() {
        let mut reader = Cursor::new(Vec::new());
        let mut buf = [0u8; 16];
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 0);
    }
}
