use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

/// Value of an HTTP `Authorization` header for [Basic authentication].
///
/// # Arguments
///
/// * `username` - Username, it must not contain a `:`.
/// * `password` - Password.
///
/// [Basic authentication]: https://datatracker.ietf.org/doc/html/rfc7617
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Random message key, in the hyphenated UUIDv4 form.
pub(crate) fn generate_key() -> String {
    Uuid::new_v4().to_string()
}

/// Random consumer group or instance name: a UUIDv4 without hyphens.
pub(crate) fn generate_name() -> String {
    Uuid::new_v4().simple().to_string()
}

/// MIME type for a file being produced.
///
/// Only names ending in `.pdf` are recognised, everything else is opaque binary.
pub(crate) fn file_mime_type(path: &Path) -> &'static str {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) if name.ends_with(".pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Used in unit tests to verify type is Thread Safe.
///
/// It enforces that the given type implements the following standard traits:
///
/// * `std::marker::Sized`: type has a constant size known at compile time
/// * `std::marker::Send`: type is safe to send to another thread
/// * `std::marker::Sync`: type is Sync if it is safe to share between threads;
///   type can be Sync if and only if a reference to it is Send
/// * `std::marker::Unpin`: type can be safely moved after pinning
#[cfg(test)]
pub(crate) fn is_thread_safe<T: Sized + Send + Sync + Unpin>() {}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use super::*;

    #[test]
    fn basic_auth_encodes_credentials() {
        assert_eq!(basic_auth("user", "pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn generated_keys_are_unique_uuids() {
        let keys: HashSet<String> = (0..100).map(|_| generate_key()).collect();
        assert_eq!(keys.len(), 100);
        assert!(keys.iter().all(|k| Uuid::parse_str(k).is_ok() && k.len() == 36));
    }

    #[test]
    fn generated_names_have_no_hyphens() {
        let name = generate_name();
        assert_eq!(name.len(), 32);
        assert!(!name.contains('-'));
    }

    #[rstest]
    #[case("report.pdf", "application/pdf")]
    #[case("/tmp/dir/report.pdf", "application/pdf")]
    #[case("image.png", "application/octet-stream")]
    #[case("README", "application/octet-stream")]
    #[case("archive.pdf.gz", "application/octet-stream")]
    #[case(".pdf", "application/pdf")]
    #[case("/tmp/dir/.pdf", "application/pdf")]
    #[case("report.PDF", "application/octet-stream")]
    fn mime_type_from_file_name(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(file_mime_type(Path::new(path)), expected);
    }
}
