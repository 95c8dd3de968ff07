//! TLS settings for the client transport.
//!
//! TLS 1.2 is the lowest accepted protocol version; asking for anything lower is
//! a configuration error at build time. Mutual TLS is enabled by supplying a PEM
//! bundle with the client certificate and private key; a custom CA may be added
//! on top of, or instead of, the built-in trust roots.

use crate::{Error, Result};

/// A TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.0 (rejected)
    Tls1_0,
    /// TLS 1.1 (rejected)
    Tls1_1,
    /// TLS 1.2
    Tls1_2,
    /// TLS 1.3
    Tls1_3,
}

/// TLS configuration applied when the client is built.
///
/// # Examples
///
/// ```
/// use pixbank::tls::{TlsConfig, TlsVersion};
///
/// let tls = TlsConfig::default().min_version(TlsVersion::Tls1_3);
/// assert_eq!(tls.min_tls_version(), TlsVersion::Tls1_3);
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    min_version: TlsVersion,
    identity_pem: Option<Vec<u8>>,
    root_ca_pem: Option<Vec<u8>>,
    built_in_roots: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls1_2,
            identity_pem: None,
            root_ca_pem: None,
            built_in_roots: true,
        }
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("min_version", &self.min_version)
            .field("client_identity", &self.identity_pem.is_some())
            .field("root_ca", &self.root_ca_pem.is_some())
            .field("built_in_roots", &self.built_in_roots)
            .finish()
    }
}

impl TlsConfig {
    /// Sets the minimum protocol version.
    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = version;
        self
    }

    /// Returns the configured minimum protocol version.
    pub fn min_tls_version(&self) -> TlsVersion {
        self.min_version
    }

    /// Sets the mTLS client identity: a PEM bundle holding the certificate
    /// chain and the PKCS#8 or RSA private key.
    pub fn client_identity_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.identity_pem = Some(pem.into());
        self
    }

    /// Adds a custom CA certificate (PEM) to the trust store.
    pub fn root_ca_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.root_ca_pem = Some(pem.into());
        self
    }

    /// Enables or disables the built-in trust roots.
    pub fn built_in_roots(mut self, enabled: bool) -> Self {
        self.built_in_roots = enabled;
        self
    }

    /// Checks the configuration without building a transport.
    pub fn validate(&self) -> Result<()> {
        if self.min_version < TlsVersion::Tls1_2 {
            return Err(Error::Configuration(format!(
                "Minimum TLS version {:?} is below TLS 1.2",
                self.min_version
            )));
        }
        if !self.built_in_roots && self.root_ca_pem.is_none() {
            return Err(Error::Configuration(
                "Built-in roots disabled without a custom CA".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies the configuration to a reqwest client builder.
    pub(crate) fn apply(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        self.validate()?;

        let version = match self.min_version {
            TlsVersion::Tls1_3 => reqwest::tls::Version::TLS_1_3,
            _ => reqwest::tls::Version::TLS_1_2,
        };
        let mut builder = builder
            .use_rustls_tls()
            .min_tls_version(version)
            .tls_built_in_root_certs(self.built_in_roots);

        if let Some(pem) = &self.identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| Error::Configuration(format!("Invalid client identity: {}", e)))?;
            builder = builder.identity(identity);
        }

        if let Some(pem) = &self.root_ca_pem {
            let ca = reqwest::Certificate::from_pem(pem)
                .map_err(|e| Error::Configuration(format!("Invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(ca);
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_rejects_versions_below_1_2() {
        for version in [TlsVersion::Tls1_0, TlsVersion::Tls1_1] {
            let err = TlsConfig::default().min_version(version).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        assert!(TlsConfig::default().validate().is_ok());
        assert!(TlsConfig::default()
            .min_version(TlsVersion::Tls1_3)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_requires_some_trust_roots() {
        let err = TlsConfig::default().built_in_roots(false).validate().unwrap_err();
        assert!(err.to_string().contains("custom CA"));
    }

    #[test]
    fn test_invalid_identity_is_configuration_error() {
        let result = TlsConfig::default()
            .client_identity_pem(b"not a pem".to_vec())
            .apply(reqwest::Client::builder());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_debug_hides_key_material() {
        let tls = TlsConfig::default().client_identity_pem(b"secret".to_vec());
        let debug = format!("{:?}", tls);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("client_identity: true"));
    }
}
