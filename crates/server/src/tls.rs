use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Result, ServerError};

/// Build the server-side TLS configuration from PEM certificate and
/// private key files.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<rustls::ServerConfig> {
    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(ServerError::Tls(format!(
            "no certificates found in {}",
            cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?.ok_or_else(|| {
        ServerError::Tls(format!("no private key found in {}", key_path.display()))
    })?;

    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Tls(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_generated_cert_and_key() {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();

        let mut cert_file = tempfile::NamedTempFile::new().unwrap();
        cert_file.write_all(cert.cert.pem().as_bytes()).unwrap();
        let mut key_file = tempfile::NamedTempFile::new().unwrap();
        key_file
            .write_all(cert.signing_key.serialize_pem().as_bytes())
            .unwrap();

        let config = load_tls_config(cert_file.path(), key_file.path());
        assert!(config.is_ok());
    }

    #[test]
    fn missing_cert_file_is_an_io_error() {
        let err = load_tls_config(Path::new("/nonexistent.crt"), Path::new("/nonexistent.key"))
            .unwrap_err();
        assert!(matches!(err, ServerError::Io(_)));
    }

    #[test]
    fn empty_pem_is_a_tls_error() {
        let cert_file = tempfile::NamedTempFile::new().unwrap();
        let key_file = tempfile::NamedTempFile::new().unwrap();
        let err = load_tls_config(cert_file.path(), key_file.path()).unwrap_err();
        assert!(matches!(err, ServerError::Tls(_)));
    }
}
