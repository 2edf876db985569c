//! Extraction of the `.mmdb` member from a MaxMind tar.gz archive.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use tar::Archive;

/// Pulls `<edition>.mmdb` out of a downloaded tar.gz archive.
///
/// MaxMind ships the database inside a dated directory together with license
/// text; only the `.mmdb` member is wanted.
pub(crate) fn extract_mmdb_from_tar_gz(tar_gz_bytes: &[u8], edition: &str) -> Result<Vec<u8>> {
    log::debug!("Extracting {}.mmdb from downloaded archive", edition);

    let gz_decoder = GzDecoder::new(tar_gz_bytes);
    let mut archive = Archive::new(gz_decoder);

    let entries = archive
        .entries()
        .context("failed to read tar archive entries")?;

    let expected_name = format!("{}.mmdb", edition);
    for entry_result in entries {
        let mut entry = entry_result.context("failed to read tar entry")?;
        let path = entry.path().context("failed to read tar entry path")?;

        if path.file_name().and_then(|n| n.to_str()) == Some(expected_name.as_str()) {
            let mut mmdb_bytes = Vec::new();
            entry
                .read_to_end(&mut mmdb_bytes)
                .with_context(|| format!("failed to read {} from archive", expected_name))?;
            log::info!(
                "Extracted {} from archive ({} bytes)",
                expected_name,
                mmdb_bytes.len()
            );
            return Ok(mmdb_bytes);
        }
    }

    Err(anyhow::anyhow!("{} not found in archive", expected_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tar::Builder;

    fn build_tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut tar_builder = Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_cksum();
            tar_builder.append(&header, *content).unwrap();
        }
        let tar_bytes = tar_builder.into_inner().unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn extracts_the_mmdb_member() {
        let mmdb = b"fake mmdb bytes";
        let archive = build_tar_gz(&[
            ("GeoLite2-City_20260801/LICENSE.txt", b"license"),
            ("GeoLite2-City_20260801/GeoLite2-City.mmdb", mmdb),
        ]);

        let extracted = extract_mmdb_from_tar_gz(&archive, "GeoLite2-City").unwrap();
        assert_eq!(extracted, mmdb);
    }

    #[test]
    fn errors_when_member_is_missing() {
        let archive = build_tar_gz(&[("README.txt", b"readme")]);
        let err = extract_mmdb_from_tar_gz(&archive, "GeoLite2-City").unwrap_err();
        assert!(err.to_string().contains("GeoLite2-City.mmdb not found"));
    }

    #[test]
    fn errors_on_garbage_input() {
        let err = extract_mmdb_from_tar_gz(b"definitely not gzip", "GeoLite2-City");
        assert!(err.is_err());
    }

    #[test]
    fn ignores_similarly_named_members() {
        let archive = build_tar_gz(&[("GeoLite2-City.mmdb.sha256", b"checksum")]);
        assert!(extract_mmdb_from_tar_gz(&archive, "GeoLite2-City").is_err());
    }
}
