//! WebSocket transport to the management server
//!
//! The peer certificate is not validated against any CA. Server identity is
//! established by the control channel through cookies and the certificate
//! hash captured here.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha384};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use url::Url;

use mcc_core::ConnectionError;

/// Login header understood by the server
pub const AUTH_HEADER: &str = "x-meshauth";

/// A connected relay WebSocket
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open transport session
pub struct Connection {
    pub stream: WsStream,
    /// SHA-384 (hex) of the server's end-entity certificate; `None` over `ws://`
    pub tls_hash: Option<String>,
}

/// Open a WebSocket session to `url`, optionally carrying an `x-meshauth` header
pub async fn connect(
    url: &Url,
    auth: Option<&str>,
    timeout: Duration,
) -> Result<Connection, ConnectionError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

    if let Some(auth) = auth {
        let value = HeaderValue::from_str(auth)
            .map_err(|e| ConnectionError::ConnectFailed(format!("invalid auth header: {}", e)))?;
        request.headers_mut().insert(AUTH_HEADER, value);
    }

    let verifier = HashCapture::new();
    let connector = Connector::Rustls(Arc::new(client_config(verifier.clone())));

    let host = url.host_str().unwrap_or_default();
    tracing::debug!("Connecting to {}", host);
    let (stream, _response) = tokio::time::timeout(
        timeout,
        tokio_tungstenite::connect_async_tls_with_config(request, None, false, Some(connector)),
    )
    .await
    .map_err(|_| ConnectionError::Timeout(format!("connecting to {}", host)))?
    .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

    Ok(Connection {
        stream,
        tls_hash: verifier.hash(),
    })
}

/// Whether a close frame is an ordinary shutdown (normal, going away, no status)
pub fn is_normal_close(frame: Option<&CloseFrame<'_>>) -> bool {
    match frame {
        None => true,
        Some(frame) => matches!(
            frame.code,
            CloseCode::Normal | CloseCode::Away | CloseCode::Status
        ),
    }
}

/// Whether a read error just means the session already ended
pub fn is_normal_error(error: &tokio_tungstenite::tungstenite::Error) -> bool {
    use tokio_tungstenite::tungstenite::Error;
    matches!(error, Error::ConnectionClosed | Error::AlreadyClosed)
}

fn client_config(verifier: Arc<HashCapture>) -> rustls::ClientConfig {
    ensure_crypto_provider();

    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth()
}

static CRYPTO_PROVIDER_INIT: std::sync::Once = std::sync::Once::new();

fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("Rustls crypto provider already installed");
        }
    });
}

/// Certificate verifier that accepts any certificate and records its hash
#[derive(Debug, Default)]
struct HashCapture {
    hash: Mutex<Option<String>>,
}

impl HashCapture {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn hash(&self) -> Option<String> {
        match self.hash.lock() {
            Ok(hash) => hash.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Lowercase hex SHA-384 of a DER certificate
pub fn certificate_hash(der: &[u8]) -> String {
    hex::encode(Sha384::digest(der))
}

impl ServerCertVerifier for HashCapture {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let hash = certificate_hash(end_entity.as_ref());
        match self.hash.lock() {
            Ok(mut slot) => *slot = Some(hash),
            Err(poisoned) => *poisoned.into_inner() = Some(hash),
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}
