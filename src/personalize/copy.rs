use std::fs::File;
use std::io;
use std::path::Path;

/// Copy `src` to `dst`, truncating `dst` if it exists.
///
/// The destination's parent directory must already exist. The copied bytes are
/// flushed to durable storage before returning.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut source = File::open(src)?;
    let mut destination = File::create(dst)?;

    io::copy(&mut source, &mut destination)?;

    destination.sync_all()
}
