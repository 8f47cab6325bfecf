//! Mutual TLS material and configuration.
//!
//! [`SecureTransportContext`] loads a CA bundle, a certificate chain and a
//! private key once, then hands out a server configuration that demands
//! client certificates and a matching client configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::{aws_lc_rs, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{RootCertStore, ServerConfig};
use tonic::transport::{Certificate, ClientTlsConfig, Identity};

use crate::config::TlsConfig;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{role} file not found: {}", path.display())]
    Missing { role: &'static str, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid CA certificate: {0}")]
    InvalidCa(rustls::Error),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),

    #[error("failed to build client verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),
}

/// Loaded trust store and identity.
pub struct SecureTransportContext {
    ca_pem: Vec<u8>,
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    ca_certs: Vec<CertificateDer<'static>>,
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl SecureTransportContext {
    /// Read and parse the configured files. Any missing file is an error.
    pub fn load(config: &TlsConfig) -> Result<Self, TlsError> {
        let ca_path = Path::new(&config.ca_cert_path);
        let cert_path = Path::new(&config.cert_path);
        let key_path = Path::new(&config.key_path);

        let ca_pem = read_pem("CA certificate", ca_path)?;
        let cert_pem = read_pem("certificate", cert_path)?;
        let key_pem = read_pem("private key", key_path)?;

        let ca_certs = parse_certs(&ca_pem, ca_path)?;
        let cert_chain = parse_certs(&cert_pem, cert_path)?;
        let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
            .map_err(|source| TlsError::Io {
                path: key_path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_path_buf()))?;

        tracing::info!(
            ca = %ca_path.display(),
            cert = %cert_path.display(),
            ca_certs = ca_certs.len(),
            chain_len = cert_chain.len(),
            "TLS material loaded"
        );

        Ok(Self {
            ca_pem,
            cert_pem,
            key_pem,
            ca_certs,
            cert_chain,
            key,
        })
    }

    fn provider() -> Arc<CryptoProvider> {
        Arc::new(aws_lc_rs::default_provider())
    }

    fn root_store(&self) -> Result<RootCertStore, TlsError> {
        let mut roots = RootCertStore::empty();
        for cert in &self.ca_certs {
            roots.add(cert.clone()).map_err(TlsError::InvalidCa)?;
        }
        Ok(roots)
    }

    /// Server configuration that requires a client certificate signed by
    /// the CA bundle. Advertises `h2` and `http/1.1`.
    pub fn server_config(&self) -> Result<ServerConfig, TlsError> {
        let provider = Self::provider();
        let roots = Arc::new(self.root_store()?);
        let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider.clone()).build()?;

        let mut config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(self.cert_chain.clone(), self.key.clone_key())?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Ok(config)
    }

    pub fn rustls_config(&self) -> Result<RustlsConfig, TlsError> {
        Ok(RustlsConfig::from_config(Arc::new(self.server_config()?)))
    }

    /// Client configuration presenting the same identity and trusting the
    /// same CA bundle.
    pub fn client_config(&self, domain_name: &str) -> ClientTlsConfig {
        ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(&self.ca_pem))
            .identity(Identity::from_pem(&self.cert_pem, &self.key_pem))
            .domain_name(domain_name)
    }
}

fn read_pem(role: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    if !path.exists() {
        return Err(TlsError::Missing {
            role,
            path: path.to_path_buf(),
        });
    }
    fs::read(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certs(pem: &[u8], path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}
