use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use tokio_rustls::{TlsConnector, rustls};
use tracing::info;

use crate::ForwardError;

/// Build the TLS connector used for `https://` targets: Mozilla roots, plus
/// the certificates of an optional PEM bundle.
pub fn build_tls_connector(extra_ca_file: Option<&Path>) -> Result<TlsConnector, ForwardError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    if let Some(path) = extra_ca_file {
        let certs = load_certs(path)?;
        let count = certs.len();
        for cert in certs {
            roots.add(&cert).map_err(|e| {
                ForwardError::TlsConfig(format!(
                    "invalid CA certificate in {}: {e}",
                    path.display()
                ))
            })?;
        }
        info!(
            target: "recache::proxy",
            ca_file = %path.display(),
            count,
            "Loaded extra upstream CA certificates"
        );
    }

    let mut config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Load PEM-encoded certificates from disk.
fn load_certs(path: &Path) -> Result<Vec<rustls::Certificate>, ForwardError> {
    let file = File::open(path).map_err(|e| {
        ForwardError::TlsConfig(format!("cannot open {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader).map_err(|e| {
        ForwardError::TlsConfig(format!("cannot parse {}: {e}", path.display()))
    })?;
    if certs.is_empty() {
        return Err(ForwardError::TlsConfig(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs.into_iter().map(rustls::Certificate).collect())
}
