// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Utility methods.

use std::boxed::Box;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lz4;

const GZ_BUF_SIZE: usize = 1 << 22;

fn has_extension(p: &Path, ext: &str) -> bool {
    p.extension().map_or(false, |e| e == ext)
}

pub fn is_gzipped(p: impl AsRef<Path>) -> bool {
    has_extension(p.as_ref(), "gz")
}

/// Open a (possibly gzipped or lz4 compressed) file into a BufReader.
pub fn open_with_gz<P: AsRef<Path>>(p: P) -> Result<Box<dyn BufRead>, Error> {
    let r = File::open(p.as_ref()).with_context(|| format!("error opening {:?}", p.as_ref()))?;

    if has_extension(p.as_ref(), "gz") {
        let gz = MultiGzDecoder::new(r);
        let buf_reader = BufReader::with_capacity(GZ_BUF_SIZE, gz);
        Ok(Box::new(buf_reader))
    } else if has_extension(p.as_ref(), "lz4") {
        let lz = lz4::Decoder::new(r)?;
        let buf_reader = BufReader::with_capacity(GZ_BUF_SIZE, lz);
        Ok(Box::new(buf_reader))
    } else {
        let buf_reader = BufReader::with_capacity(32 * 1024, r);
        Ok(Box::new(buf_reader))
    }
}

/// True if the (decompressed) file has no content or only a single line.
/// Such files carry no complete FASTQ record. Reads at most two lines.
pub fn has_at_most_one_line(p: impl AsRef<Path>) -> Result<bool, Error> {
    let mut reader = open_with_gz(p)?;
    let mut buf = Vec::new();
    let mut lines = 0;
    while lines < 2 {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        lines += 1;
    }
    Ok(lines <= 1)
}

/// `<p>.gz`
pub fn gz_path(p: impl AsRef<Path>) -> PathBuf {
    let mut name = p.as_ref().as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `p` to `<p>.gz`, then remove `p`. The compressed file is fully
/// written and closed when this returns. Fails if `<p>.gz` already exists.
pub fn gzip_file(p: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let src = p.as_ref();
    let dest = gz_path(src);

    let mut reader = BufReader::with_capacity(GZ_BUF_SIZE, File::open(src)?);
    let out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&dest)
        .with_context(|| format!("error creating {:?}", dest))?;
    let mut encoder = GzEncoder::new(BufWriter::new(out), Compression::default());
    io::copy(&mut reader, &mut encoder).with_context(|| format!("error compressing {:?}", src))?;

    let mut writer = encoder.finish()?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()?;

    std::fs::remove_file(src).with_context(|| format!("error removing {:?}", src))?;
    Ok(dest)
}

/// Read a whole (possibly compressed) file into memory. Used for small inputs.
pub fn read_to_string(p: impl AsRef<Path>) -> Result<String, Error> {
    let mut s = String::new();
    open_with_gz(p.as_ref())?
        .read_to_string(&mut s)
        .with_context(|| format!("error reading {:?}", p.as_ref()))?;
    Ok(s)
}
