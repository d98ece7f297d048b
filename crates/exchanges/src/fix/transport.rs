//! Socket transport for FIX sessions: plain TCP or rustls over monoio.
//!
//! The stream is split after connecting so the session can keep a read in
//! flight while it writes. Under TLS both halves share one
//! `ClientConnection`; the lock is never held across an await.

use crate::errors::{ExchangeError, Result};
use monoio::io::{AsyncReadRent, AsyncWriteRent, AsyncWriteRentExt, OwnedReadHalf, OwnedWriteHalf, Splitable};
use monoio::net::TcpStream;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Client certificate settings for a TLS FIX session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub certfile: PathBuf,
    pub keyfile: PathBuf,
    /// Extra trust anchors on top of the webpki roots
    pub ca_certs: Option<PathBuf>,
    /// SNI override; defaults to the endpoint host
    pub server_name: Option<String>,
}

impl TlsSettings {
    pub fn new(certfile: impl Into<PathBuf>, keyfile: impl Into<PathBuf>) -> Self {
        Self {
            certfile: certfile.into(),
            keyfile: keyfile.into(),
            ca_certs: None,
            server_name: None,
        }
    }

    pub fn with_ca_certs(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_certs = Some(path.into());
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Settings from `certfile`, `keyfile` and optional `ca_certs` entries.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| {
            map.get(key)
                .cloned()
                .ok_or_else(|| ExchangeError::ConfigurationError(format!("cert string has no '{key}'")))
        };
        let mut settings = Self::new(required("certfile")?, required("keyfile")?);
        if let Some(ca) = map.get("ca_certs") {
            settings = settings.with_ca_certs(ca);
        }
        Ok(settings)
    }

    pub fn client_config(&self) -> Result<Arc<ClientConfig>> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        if let Some(ca) = &self.ca_certs {
            for cert in load_certs(ca)? {
                roots.add(cert)?;
            }
        }

        let certs = load_certs(&self.certfile)?;
        let key = load_private_key(&self.keyfile)?;
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)?;
        Ok(Arc::new(config))
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ExchangeError::ConfigurationError(format!("cannot open {}: {e}", path.display())))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| ExchangeError::TlsError(format!("bad certificate in {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(ExchangeError::TlsError(format!("no certificates in {}", path.display())));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| ExchangeError::TlsError(format!("bad private key in {}: {e}", path.display())))?
        .ok_or_else(|| ExchangeError::TlsError(format!("no private key in {}", path.display())))
}

/// Split `host:port`.
pub fn split_endpoint(endpoint: &str) -> Result<(&str, u16)> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| ExchangeError::InvalidEndpoint(format!("{endpoint} is not host:port")))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| ExchangeError::InvalidEndpoint(format!("{endpoint} has no valid port")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(ExchangeError::InvalidEndpoint(format!("{endpoint} has no host")));
    }
    Ok((host, port))
}

/// Connect, optionally run the TLS handshake, and split the stream.
pub async fn connect(
    endpoint: &str,
    tls: Option<&TlsSettings>,
    connect_timeout: Duration,
    read_buffer_size: usize,
) -> Result<(FixReader, FixWriter)> {
    let (host, port) = split_endpoint(endpoint)?;
    let mut stream = monoio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ExchangeError::Timeout(format!("connecting to {endpoint}")))?
        .map_err(|e| ExchangeError::ConnectionFailed(format!("{endpoint}: {e}")))?;
    stream.set_nodelay(true)?;

    let conn = match tls {
        Some(settings) => {
            let name = settings.server_name.clone().unwrap_or_else(|| host.to_string());
            let server_name = ServerName::try_from(name)
                .map_err(|e| ExchangeError::TlsError(format!("invalid server name: {e}")))?;
            let mut conn = ClientConnection::new(settings.client_config()?, server_name)?;
            monoio::time::timeout(connect_timeout, complete_handshake(&mut stream, &mut conn))
                .await
                .map_err(|_| ExchangeError::Timeout(format!("TLS handshake with {endpoint}")))??;
            info!("🔐 TLS session established with {}", endpoint);
            Some(Arc::new(Mutex::new(conn)))
        }
        None => None,
    };

    let (read_half, write_half) = stream.into_split();
    Ok((
        FixReader {
            half: read_half,
            tls: conn.clone(),
            buf: Vec::with_capacity(read_buffer_size),
            read_buffer_size,
        },
        FixWriter { half: write_half, tls: conn },
    ))
}

async fn complete_handshake(stream: &mut TcpStream, conn: &mut ClientConnection) -> Result<()> {
    while conn.is_handshaking() {
        while conn.wants_write() {
            let mut out = Vec::with_capacity(4096);
            conn.write_tls(&mut out)?;
            let (result, _) = stream.write_all(out).await;
            result?;
        }
        if !conn.is_handshaking() {
            break;
        }
        if !conn.wants_read() {
            return Err(ExchangeError::TlsError("TLS handshake stalled".to_string()));
        }

        let (result, buf) = stream.read(Vec::with_capacity(4096)).await;
        if result? == 0 {
            return Err(ExchangeError::ConnectionFailed("connection closed during TLS handshake".to_string()));
        }
        let mut cursor = std::io::Cursor::new(buf.as_slice());
        while (cursor.position() as usize) < buf.len() {
            conn.read_tls(&mut cursor)?;
            conn.process_new_packets()?;
        }
    }

    // flush the client Finished
    while conn.wants_write() {
        let mut out = Vec::with_capacity(1024);
        conn.write_tls(&mut out)?;
        let (result, _) = stream.write_all(out).await;
        result?;
    }
    Ok(())
}

fn lock(conn: &Mutex<ClientConnection>) -> Result<std::sync::MutexGuard<'_, ClientConnection>> {
    conn.lock()
        .map_err(|_| ExchangeError::TlsError("TLS state poisoned".to_string()))
}

/// Reading half of a FIX connection
pub struct FixReader {
    half: OwnedReadHalf<TcpStream>,
    tls: Option<Arc<Mutex<ClientConnection>>>,
    buf: Vec<u8>,
    read_buffer_size: usize,
}

impl FixReader {
    /// Next chunk of application bytes; `None` once the peer has closed.
    pub async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let mut buf = std::mem::take(&mut self.buf);
            buf.clear();
            buf.reserve(self.read_buffer_size);
            let (result, buf) = self.half.read(buf).await;
            let n = result?;
            if n == 0 {
                return Ok(None);
            }

            let Some(conn) = &self.tls else {
                let chunk = buf[..n].to_vec();
                self.buf = buf;
                return Ok(Some(chunk));
            };

            let mut plaintext = Vec::with_capacity(n);
            let closed = {
                let mut conn = lock(conn)?;
                let mut cursor = std::io::Cursor::new(&buf[..n]);
                let mut closed = false;
                while (cursor.position() as usize) < n {
                    conn.read_tls(&mut cursor)?;
                    conn.process_new_packets()?;
                    closed |= drain_plaintext(&mut conn, &mut plaintext)?;
                }
                closed
            };
            self.buf = buf;

            if !plaintext.is_empty() {
                return Ok(Some(plaintext));
            }
            if closed {
                debug!("TLS close_notify received");
                return Ok(None);
            }
        }
    }

    /// TLS records produced while reading that the writer must send.
    pub fn tls_wants_write(&self) -> bool {
        match &self.tls {
            Some(conn) => lock(conn).map(|c| c.wants_write()).unwrap_or(false),
            None => false,
        }
    }
}

/// Returns true once the peer sent close_notify.
fn drain_plaintext(conn: &mut ClientConnection, out: &mut Vec<u8>) -> Result<bool> {
    let mut chunk = [0u8; 4096];
    loop {
        match conn.reader().read(&mut chunk) {
            Ok(0) => return Ok(true),
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) => return Err(ExchangeError::TlsError(format!("TLS read failed: {e}"))),
        }
    }
}

/// Writing half of a FIX connection
pub struct FixWriter {
    half: OwnedWriteHalf<TcpStream>,
    tls: Option<Arc<Mutex<ClientConnection>>>,
}

impl FixWriter {
    pub async fn write_all(&mut self, data: Vec<u8>) -> Result<()> {
        let wire = match &self.tls {
            None => data,
            Some(conn) => {
                let mut conn = lock(conn)?;
                conn.writer()
                    .write_all(&data)
                    .map_err(|e| ExchangeError::TlsError(format!("TLS application write failed: {e}")))?;
                take_tls_output(&mut conn)?
            }
        };
        if wire.is_empty() {
            return Ok(());
        }
        let (result, _) = self.half.write_all(wire).await;
        result?;
        Ok(())
    }

    /// Send TLS records queued by the reader (alerts, key updates).
    pub async fn flush_tls(&mut self) -> Result<()> {
        self.write_all(Vec::new()).await
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(conn) = &self.tls {
            let out = {
                let mut conn = lock(conn)?;
                conn.send_close_notify();
                take_tls_output(&mut conn)?
            };
            if !out.is_empty() {
                let (result, _) = self.half.write_all(out).await;
                result?;
            }
        }
        self.half.shutdown().await?;
        Ok(())
    }
}

fn take_tls_output(conn: &mut ClientConnection) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    while conn.wants_write() {
        conn.write_tls(&mut out)?;
    }
    Ok(out)
}
