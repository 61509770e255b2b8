//! Newest-file retrieval from an SFTP server
//!
//! The newest remote `*.json` file is downloaded into the local download
//! folder and imported from there. Deleting the document removes only the
//! local copy; the remote file is left in place.

use async_trait::async_trait;
use ssh2::{CheckResult, KnownHostFileKind, MethodType, Session};
use std::fmt::Display;
use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vocab_common::config::SftpConfig;

use super::{is_json_file, DocumentSource, SourceDocument};
use crate::error::SourceFault;

/// Regular file listed in the remote folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub path: PathBuf,
    /// Seconds since the epoch
    pub mtime: u64,
}

/// Newest `*.json` entry by modification time; ties go to the greater path
pub fn newest_json(entries: impl IntoIterator<Item = RemoteEntry>) -> Option<RemoteEntry> {
    entries
        .into_iter()
        .filter(|entry| is_json_file(&entry.path))
        .max_by(|a, b| (a.mtime, &a.path).cmp(&(b.mtime, &b.path)))
}

/// How the session authenticates
#[derive(Debug, PartialEq, Eq)]
enum Credentials<'a> {
    /// Private key, with `password` as passphrase when both are configured
    KeyFile { path: &'a Path, passphrase: Option<&'a str> },
    Password(&'a str),
}

/// Downloads the newest JSON feed from a remote folder
#[derive(Debug, Clone)]
pub struct SftpSource {
    settings: SftpConfig,
    download_folder: PathBuf,
}

impl SftpSource {
    pub fn new(settings: SftpConfig, download_folder: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            download_folder: download_folder.into(),
        }
    }

    fn credentials(&self) -> Result<Credentials<'_>, SourceFault> {
        let password = self.settings.password.as_deref().filter(|p| !p.trim().is_empty());
        let keyfile = self.settings.keyfile.as_deref().filter(|k| !k.as_os_str().is_empty());

        match (keyfile, password) {
            (Some(path), passphrase) => Ok(Credentials::KeyFile { path, passphrase }),
            (None, Some(password)) => Ok(Credentials::Password(password)),
            (None, None) => Err(self.fault("authenticate", "neither password nor keyfile configured")),
        }
    }

    fn fault(&self, action: &str, err: impl Display) -> SourceFault {
        SourceFault::Remote {
            host: format!("{}:{}", self.settings.hostname, self.settings.port),
            message: format!("{}: {}", action, err),
        }
    }

    fn connect(&self, credentials: &Credentials<'_>) -> Result<Session, SourceFault> {
        let settings = &self.settings;

        let tcp = TcpStream::connect((settings.hostname.as_str(), settings.port))
            .map_err(|e| self.fault("connect", e))?;
        let mut session = Session::new().map_err(|e| self.fault("create session", e))?;
        session.set_tcp_stream(tcp);

        if let Some(algorithms) = settings
            .pubkey_accepted_algorithms
            .as_deref()
            .filter(|a| !a.trim().is_empty())
        {
            session
                .method_pref(MethodType::SignAlgo, algorithms)
                .map_err(|e| self.fault("set public key algorithms", e))?;
        }

        session.handshake().map_err(|e| self.fault("handshake", e))?;
        self.verify_host_key(&session)?;

        match credentials {
            Credentials::KeyFile { path, passphrase } => session
                .userauth_pubkey_file(&settings.username, None, path, *passphrase)
                .map_err(|e| self.fault("key authentication", e))?,
            Credentials::Password(password) => session
                .userauth_password(&settings.username, password)
                .map_err(|e| self.fault("password authentication", e))?,
        }

        if !session.authenticated() {
            return Err(self.fault("authenticate", "rejected by server"));
        }

        debug!(host = %settings.hostname, user = %settings.username, "SFTP session established");
        Ok(session)
    }

    fn verify_host_key(&self, session: &Session) -> Result<(), SourceFault> {
        let file = self.settings.known_hosts_file();
        let mut known_hosts = session.known_hosts().map_err(|e| self.fault("load known hosts", e))?;
        known_hosts
            .read_file(&file, KnownHostFileKind::OpenSSH)
            .map_err(|e| self.fault(&format!("read {}", file.display()), e))?;

        let (key, _) = session
            .host_key()
            .ok_or_else(|| self.fault("verify host key", "server sent no host key"))?;

        match known_hosts.check_port(&self.settings.hostname, self.settings.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound => Err(self.fault(
                "verify host key",
                format!("host not listed in {}", file.display()),
            )),
            CheckResult::Mismatch => Err(self.fault("verify host key", "host key does not match known_hosts entry")),
            CheckResult::Failure => Err(self.fault("verify host key", "known_hosts check failed")),
        }
    }

    /// List, pick and download; blocks on network I/O
    fn download_latest(&self) -> Result<Option<SourceDocument>, SourceFault> {
        let credentials = self.credentials()?;
        let session = self.connect(&credentials)?;
        let sftp = session.sftp().map_err(|e| self.fault("open SFTP channel", e))?;

        let remote_folder = self.settings.remote_folder.as_path();
        let listing = sftp
            .readdir(remote_folder)
            .map_err(|e| self.fault(&format!("list {}", remote_folder.display()), e))?;

        let entries = listing
            .into_iter()
            .filter(|(_, stat)| stat.is_file())
            .map(|(path, stat)| RemoteEntry {
                path,
                mtime: stat.mtime.unwrap_or(0),
            });

        let Some(newest) = newest_json(entries) else {
            debug!(folder = %remote_folder.display(), "No remote JSON file found");
            return Ok(None);
        };
        let Some(file_name) = newest.path.file_name() else {
            return Err(self.fault("download", format!("{} has no file name", newest.path.display())));
        };

        let mut bytes = Vec::new();
        sftp.open(newest.path.as_path())
            .map_err(|e| self.fault(&format!("open {}", newest.path.display()), e))?
            .read_to_end(&mut bytes)
            .map_err(|e| self.fault(&format!("read {}", newest.path.display()), e))?;

        std::fs::create_dir_all(&self.download_folder).map_err(|source| SourceFault::Download {
            path: self.download_folder.clone(),
            source,
        })?;
        let local = self.download_folder.join(file_name);
        std::fs::write(&local, &bytes).map_err(|source| SourceFault::Download {
            path: local.clone(),
            source,
        })?;

        if let Err(e) = session.disconnect(None, "import download complete", None) {
            debug!("SFTP disconnect failed: {}", e);
        }

        info!(
            host = %self.settings.hostname,
            remote = %newest.path.display(),
            file = %local.display(),
            bytes = bytes.len(),
            "Downloaded import file"
        );

        Ok(Some(SourceDocument { location: local, bytes }))
    }
}

#[async_trait]
impl DocumentSource for SftpSource {
    async fn fetch_latest_document(&self) -> Result<Option<SourceDocument>, SourceFault> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.download_latest())
            .await
            .map_err(|e| self.fault("download task", e))?
    }

    async fn delete_source_document(&self, document: &SourceDocument) -> std::io::Result<()> {
        tokio::fs::remove_file(&document.location).await
    }
}
