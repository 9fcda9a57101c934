//! Common test fixtures for ferry testing

use crate::TestDir;
use anyhow::Result;

/// Creates the standard transfer tree used by pipeline tests
///
/// ```text
/// root/
///   alpha.txt
///   beta.log
///   nested/gamma.txt
///   nested/deep/delta.bin
/// ```
pub fn create_transfer_tree(test_dir: &TestDir) -> Result<()> {
    test_dir.create_file("alpha.txt", b"alpha content")?;
    test_dir.create_file("beta.log", b"beta log line\n")?;

    test_dir.create_dir("nested")?;
    test_dir.create_file("nested/gamma.txt", b"gamma in nested")?;
    test_dir.create_dir("nested/deep")?;
    test_dir.create_file("nested/deep/delta.bin", &[0xDE, 0xAD, 0xBE, 0xEF])?;

    Ok(())
}

/// Byte sizes of the files laid out by [`create_transfer_tree`]
pub fn transfer_tree_total_bytes() -> u64 {
    (b"alpha content".len() + b"beta log line\n".len() + b"gamma in nested".len() + 4) as u64
}

/// Creates a file of `size` patterned bytes, suitable for multipart
/// round-trip checks
pub fn create_patterned_file(test_dir: &TestDir, name: &str, size: usize) -> Result<Vec<u8>> {
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    test_dir.create_file(name, &data)?;
    Ok(data)
}
