use std::{fs, io};
use std::io::{BufRead, BufReader};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub(crate) fn file_to_vec(filename: &str) -> io::Result<Vec<String>> {
    let file_in = fs::File::open(filename)?;
    let file_reader = BufReader::new(file_in);
    Ok(file_reader.lines().filter_map(io::Result::ok).collect())
}

pub(crate) fn encode_image_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn decode_image_base64(encoded: &str) -> anyhow::Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn base64_round_trip_is_byte_identical() {
        let payload: Vec<u8> = (0u16..=255).map(|b| b as u8).collect();
        let encoded = encode_image_base64(&payload);
        let decoded = decode_image_base64(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn garbage_base64_is_an_error() {
        assert!(decode_image_base64("not base64 at all!!!").is_err());
    }

    #[test]
    fn reads_lines_into_vec() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shade").unwrap();
        writeln!(file, "blank").unwrap();

        let lines = file_to_vec(file.path().to_str().unwrap()).unwrap();
        assert_eq!(lines, vec!["shade", "blank"]);
    }
}
