// File-level helpers for signature, delta and patch.
//
// Provides `signature_file()`, `delta_file()` and `patch_file()`, which wrap
// the streaming operations with buffered file I/O and scoped output: the
// result goes to a temp file that only replaces the destination once the
// operation completed. Optionally computes a streaming SHA-256 of the
// produced file (feature `file-io`).

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::cancel::CancelFlag;
use crate::delta::stats::{DeltaStats, PatchStats, SignatureStats};
use crate::delta::{encoder, patcher, signer};
use crate::error::Result;
use crate::format::signature::Signature;
use crate::hash::config::SignatureOptions;
use crate::hash::table::BlockIndex;

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Scoped output file
// ---------------------------------------------------------------------------

/// Output written to a sibling temp file and moved into place by
/// [`commit`](Self::commit).
///
/// Until then the destination is untouched, so a failed operation neither
/// leaves a partial file behind nor clobbers what was there before. This
/// also makes patching a basis onto itself safe.
pub struct OutputFile {
    path: PathBuf,
    overwrite: bool,
    writer: Option<BufWriter<NamedTempFile>>,
}

impl OutputFile {
    /// Prepare output for `path`. Without `overwrite` an existing file is an
    /// `AlreadyExists` error and is left untouched.
    pub fn create(path: &Path, overwrite: bool) -> io::Result<Self> {
        if !overwrite && fs::symlink_metadata(path).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        log::debug!(
            "writing {} via {}",
            path.display(),
            temp.path().display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            overwrite,
            writer: Some(BufWriter::with_capacity(BUF_SIZE, temp)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, move the file to its destination and return its size.
    pub fn commit(mut self) -> io::Result<u64> {
        let Some(writer) = self.writer.take() else {
            return Ok(0);
        };
        let temp = writer.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        let len = temp.as_file().metadata()?.len();
        let persisted = if self.overwrite {
            temp.persist(&self.path)
        } else {
            temp.persist_noclobber(&self.path)
        };
        persisted.map_err(|e| e.error)?;
        log::debug!("committed {} ({len} bytes)", self.path.display());
        Ok(len)
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<NamedTempFile>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("output file already committed"))
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        // Dropping the temp file removes it.
        if self.writer.take().is_some() {
            log::debug!("discarded output for {}", self.path.display());
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Result of a file-level operation.
#[derive(Debug, Clone)]
pub struct FileReport<S> {
    /// Statistics of the underlying stream operation.
    pub stats: S,
    /// Size of the committed output file.
    pub output_size: u64,
    /// SHA-256 of the output file (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

/// Lowercase hex rendering of a digest.
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

// ---------------------------------------------------------------------------
// File operations
// ---------------------------------------------------------------------------

/// Write the signature of `basis_path` to `sig_path`.
pub fn signature_file(
    basis_path: &Path,
    sig_path: &Path,
    opts: &SignatureOptions,
    overwrite: bool,
    cancel: Option<CancelFlag>,
) -> Result<FileReport<SignatureStats>> {
    let mut basis = BufReader::with_capacity(BUF_SIZE, File::open(basis_path)?);
    let (sig, stats) = signer::build(&mut basis, opts, cancel)?;

    let mut out = OutputFile::create(sig_path, overwrite)?;
    let output_sha256 = {
        let mut w = HashingWriter::new(&mut out);
        sig.write_to(&mut w)?;
        w.finish()
    };
    let output_size = out.commit()?;
    Ok(FileReport {
        stats,
        output_size,
        output_sha256,
    })
}

/// Load a signature file.
pub fn load_signature_file(sig_path: &Path) -> Result<Signature> {
    let mut r = BufReader::with_capacity(BUF_SIZE, File::open(sig_path)?);
    Signature::read_from(&mut r)
}

/// Write the delta from the basis described by `sig_path` to `new_path`.
pub fn delta_file(
    sig_path: &Path,
    new_path: &Path,
    delta_path: &Path,
    overwrite: bool,
    cancel: Option<CancelFlag>,
) -> Result<FileReport<DeltaStats>> {
    let sig = load_signature_file(sig_path)?;
    let index = BlockIndex::new(&sig)?;
    let mut new = BufReader::with_capacity(BUF_SIZE, File::open(new_path)?);

    let mut out = OutputFile::create(delta_path, overwrite)?;
    let (w, stats) = encoder::encode(&index, &mut new, HashingWriter::new(&mut out), cancel)?;
    let output_sha256 = w.finish();
    let output_size = out.commit()?;
    Ok(FileReport {
        stats,
        output_size,
        output_sha256,
    })
}

/// Reconstruct `out_path` from `basis_path` and `delta_path`.
pub fn patch_file(
    basis_path: &Path,
    delta_path: &Path,
    out_path: &Path,
    overwrite: bool,
    cancel: Option<CancelFlag>,
) -> Result<FileReport<PatchStats>> {
    let basis = BufReader::with_capacity(BUF_SIZE, File::open(basis_path)?);
    let delta = BufReader::with_capacity(BUF_SIZE, File::open(delta_path)?);

    let mut out = OutputFile::create(out_path, overwrite)?;
    let mut w = HashingWriter::new(&mut out);
    let stats = patcher::apply(basis, delta, &mut w, cancel)?;
    let output_sha256 = w.finish();
    let output_size = out.commit()?;
    Ok(FileReport {
        stats,
        output_size,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Hashing writer
// ---------------------------------------------------------------------------

/// Pass-through writer that hashes what it forwards when `file-io` is on.
pub struct HashingWriter<W: Write> {
    inner: W,
    #[cfg(feature = "file-io")]
    hasher: sha2::Sha256,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            #[cfg(feature = "file-io")]
            hasher: sha2::Sha256::new(),
        }
    }

    /// Digest of everything written so far.
    pub fn finish(self) -> Option<[u8; 32]> {
        #[cfg(feature = "file-io")]
        {
            Some(self.hasher.finalize().into())
        }
        #[cfg(not(feature = "file-io"))]
        {
            None
        }
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        #[cfg(feature = "file-io")]
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::strong::ChecksumVariant;
    use tempfile::tempdir;

    #[test]
    fn signature_delta_patch_files() {
        let dir = tempdir().unwrap();
        let basis = dir.path().join("basis.bin");
        let new = dir.path().join("new.bin");
        let sig = dir.path().join("basis.sig");
        let delta = dir.path().join("new.delta");
        let out = dir.path().join("out.bin");

        let basis_data = b"The quick brown fox jumps over the lazy dog. 1234567890".repeat(50);
        let mut new_data = basis_data.clone();
        new_data[700..720].copy_from_slice(b"--- changed bytes --");
        fs::write(&basis, &basis_data).unwrap();
        fs::write(&new, &new_data).unwrap();

        let opts = SignatureOptions::new(64, 0, ChecksumVariant::Blake2);
        let s = signature_file(&basis, &sig, &opts, false, None).unwrap();
        assert_eq!(s.output_size, fs::metadata(&sig).unwrap().len());

        let d = delta_file(&sig, &new, &delta, false, None).unwrap();
        assert!(d.stats.copy_cmds >= 1);
        assert!(d.output_size < new_data.len() as u64);

        let p = patch_file(&basis, &delta, &out, false, None).unwrap();
        assert_eq!(p.output_size, new_data.len() as u64);
        assert_eq!(fs::read(&out).unwrap(), new_data);
    }

    #[test]
    fn existing_output_needs_overwrite() {
        let dir = tempdir().unwrap();
        let basis = dir.path().join("basis.bin");
        let sig = dir.path().join("basis.sig");
        fs::write(&basis, b"abc").unwrap();
        fs::write(&sig, b"keep me").unwrap();

        let err = signature_file(&basis, &sig, &SignatureOptions::default(), false, None)
            .unwrap_err();
        assert!(err.is_io());
        assert_eq!(fs::read(&sig).unwrap(), b"keep me");

        signature_file(&basis, &sig, &SignatureOptions::default(), true, None).unwrap();
        assert_ne!(fs::read(&sig).unwrap(), b"keep me");
    }

    #[test]
    fn failed_patch_leaves_no_output() {
        let dir = tempdir().unwrap();
        let basis = dir.path().join("basis.bin");
        let delta = dir.path().join("bad.delta");
        let out = dir.path().join("out.bin");
        fs::write(&basis, b"short").unwrap();

        let mut w = crate::format::DeltaWriter::new(Vec::new()).unwrap();
        w.write_literal(b"prefix").unwrap();
        w.write_copy(0, 100).unwrap();
        fs::write(&delta, w.finish().unwrap().0).unwrap();

        let err = patch_file(&basis, &delta, &out, false, None).unwrap_err();
        assert!(err.is_io());
        assert!(!out.exists());
    }

    fn bad_delta(path: &Path) {
        let mut w = crate::format::DeltaWriter::new(Vec::new()).unwrap();
        w.write_literal(b"prefix").unwrap();
        w.write_copy(0, 100).unwrap();
        fs::write(path, w.finish().unwrap().0).unwrap();
    }

    #[test]
    fn failed_overwrite_keeps_previous_output() {
        let dir = tempdir().unwrap();
        let basis = dir.path().join("basis.bin");
        let delta = dir.path().join("bad.delta");
        let out = dir.path().join("out.bin");
        fs::write(&basis, b"short").unwrap();
        fs::write(&out, b"previous contents").unwrap();
        bad_delta(&delta);

        let err = patch_file(&basis, &delta, &out, true, None).unwrap_err();
        assert!(err.is_io());
        assert_eq!(fs::read(&out).unwrap(), b"previous contents");
        // No temp files left next to the destination.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn patch_onto_basis_itself() {
        let dir = tempdir().unwrap();
        let basis = dir.path().join("basis.bin");
        let delta = dir.path().join("d.delta");
        fs::write(&basis, b"short").unwrap();
        bad_delta(&delta);

        assert!(patch_file(&basis, &delta, &basis, true, None).is_err());
        assert_eq!(fs::read(&basis).unwrap(), b"short");

        let mut w = crate::format::DeltaWriter::new(Vec::new()).unwrap();
        w.write_copy(1, 4).unwrap();
        w.write_literal(b"er!").unwrap();
        fs::write(&delta, w.finish().unwrap().0).unwrap();

        patch_file(&basis, &delta, &basis, true, None).unwrap();
        assert_eq!(fs::read(&basis).unwrap(), b"horter!");
    }

    #[test]
    fn missing_input_creates_nothing() {
        let dir = tempdir().unwrap();
        let sig = dir.path().join("basis.sig");
        let err = signature_file(
            &dir.path().join("nope"),
            &sig,
            &SignatureOptions::default(),
            false,
            None,
        )
        .unwrap_err();
        assert!(err.is_io());
        assert!(!sig.exists());
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn sha256_of_output() {
        let dir = tempdir().unwrap();
        let basis = dir.path().join("basis.bin");
        let sig = dir.path().join("basis.sig");
        fs::write(&basis, b"hash me").unwrap();

        let report = signature_file(&basis, &sig, &SignatureOptions::default(), false, None)
            .unwrap();
        let expect: [u8; 32] = sha2::Sha256::digest(fs::read(&sig).unwrap()).into();
        assert_eq!(report.output_sha256, Some(expect));
    }

    #[test]
    fn hex_rendering() {
        assert_eq!(hex(&[0x00, 0xab, 0x10]), "00ab10");
    }
}
