use crate::{error::VarhiveError, utils::util::Result};
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{BufReader, Read as ioRead},
    path::Path,
};

pub fn open_catalog_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    fn is_gzipped(path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        path_str.ends_with(".gz") || path_str.ends_with(".gzip")
    }
    let file = File::open(path).map_err(|error| {
        crate::varhive_error!("Failed to open file {}: {error}", path.display())
    })?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(VarhiveError::InvalidGzipHeader {
                path: path.to_path_buf(),
            })
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::{BufRead, Write};

    #[test]
    fn reads_plain_and_gzipped_files() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let plain = temp_dir.path().join("contigs.tsv");
        std::fs::write(&plain, "1\t100\n").unwrap();

        let gzipped = temp_dir.path().join("contigs.tsv.gz");
        let mut encoder = GzEncoder::new(File::create(&gzipped).unwrap(), Compression::default());
        encoder.write_all(b"1\t100\n").unwrap();
        encoder.finish().unwrap();

        for path in [plain, gzipped] {
            let reader = open_catalog_reader(&path).expect("reader should open");
            let lines = reader.lines().collect::<std::io::Result<Vec<_>>>().unwrap();
            assert_eq!(lines, vec!["1\t100".to_string()]);
        }
    }

    #[test]
    fn rejects_gz_suffix_without_gzip_content() {
        let temp_dir = tempfile::tempdir().expect("temp dir should be created");
        let path = temp_dir.path().join("contigs.tsv.gz");
        std::fs::write(&path, "not gzip").unwrap();
        let result = open_catalog_reader(&path);
        assert!(matches!(result, Err(VarhiveError::InvalidGzipHeader { .. })));
    }
}
