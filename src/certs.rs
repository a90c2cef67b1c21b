// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster CA and per-node TLS certificate management.
//!
//! Each assembly owns a self-signed cluster CA, stored in the Secret
//! `<cluster>-cluster-ca` (`ca.key` / `ca.crt`). Every stateful component
//! additionally owns a `<component>-certs` Secret with one certificate and
//! key per replica, named after the pod (`<component>-0.crt`,
//! `<component>-0.key`, ...).
//!
//! Generation is incremental: scaling up mints certificates only for the
//! new ordinals, existing entries are left byte-for-byte untouched so pods
//! keep their identity across reconciliations. Scaling down leaves the
//! surplus entries in place; they are reused if the component scales back
//! up. A full re-issue happens only through [`CertManager::renew_node_certs`].

use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::{debug, info};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::constants::DEFAULT_CERT_VALIDITY_DAYS;
use crate::error::{Error, Result};
use crate::store::ResourceStore;

// ============================================================================
// Secret layout
// ============================================================================

/// Key of the CA private key inside the cluster CA Secret.
pub const CA_KEY: &str = "ca.key";

/// Key of the CA certificate inside the cluster CA Secret.
pub const CA_CERT: &str = "ca.crt";

/// Name of the cluster CA Secret for an assembly.
#[must_use]
pub fn ca_secret_name(cluster: &str) -> String {
    format!("{cluster}-cluster-ca")
}

/// Name of the per-node certificate Secret for a component.
#[must_use]
pub fn node_certs_secret_name(component: &str) -> String {
    format!("{component}-certs")
}

// ============================================================================
// Cluster CA
// ============================================================================

/// An assembly's certificate authority, loaded from or destined for the
/// cluster CA Secret.
#[derive(Clone)]
pub struct ClusterCa {
    cert_pem: String,
    key_pem: String,
    validity_days: i64,
}

impl ClusterCa {
    /// Generate a fresh self-signed CA for the named cluster.
    pub fn generate(cluster: &str, validity_days: i64) -> Result<Self> {
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(format!("{cluster} cluster CA")),
        );
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let (not_before, not_after) = validity_window(validity_days);
        params.not_before = not_before;
        params.not_after = not_after;

        let key_pair = KeyPair::generate()
            .map_err(|e| Error::Cert(format!("failed to generate CA key: {e}")))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Cert(format!("failed to self-sign CA cert: {e}")))?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            validity_days,
        })
    }

    /// Load a CA from PEM material, validating that both parts parse.
    pub fn from_pem(cert_pem: &str, key_pem: &str, validity_days: i64) -> Result<Self> {
        KeyPair::from_pem(key_pem)
            .map_err(|e| Error::Cert(format!("failed to parse CA key: {e}")))?;
        parse_pem(cert_pem)?;
        Ok(Self {
            cert_pem: cert_pem.to_string(),
            key_pem: key_pem.to_string(),
            validity_days,
        })
    }

    /// PEM-encoded CA certificate, as distributed to clients.
    #[must_use]
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// PEM-encoded CA private key.
    #[must_use]
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// Issue a server certificate for one pod, with the given SANs.
    ///
    /// # Returns
    ///
    /// The certificate and private key, both PEM-encoded.
    pub fn issue_server_cert(&self, common_name: &str, sans: &[String]) -> Result<(String, String)> {
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(common_name.to_string()),
        );
        params.distinguished_name = dn;
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            rcgen::ExtendedKeyUsagePurpose::ClientAuth,
        ];

        let (not_before, not_after) = validity_window(self.validity_days);
        params.not_before = not_before;
        params.not_after = not_after;

        params.subject_alt_names = sans
            .iter()
            .map(|san| {
                Ia5String::try_from(san.clone())
                    .map(SanType::DnsName)
                    .map_err(|e| Error::Cert(format!("invalid DNS name '{san}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let node_key = KeyPair::generate()
            .map_err(|e| Error::Cert(format!("failed to generate node key: {e}")))?;

        let ca_key = KeyPair::from_pem(&self.key_pem)
            .map_err(|e| Error::Cert(format!("failed to load CA key: {e}")))?;
        let issuer = Issuer::from_ca_cert_pem(&self.cert_pem, &ca_key)
            .map_err(|e| Error::Cert(format!("failed to build issuer: {e}")))?;

        let cert = params
            .signed_by(&node_key, &issuer)
            .map_err(|e| Error::Cert(format!("failed to sign node cert: {e}")))?;

        Ok((cert.pem(), node_key.serialize_pem()))
    }
}

/// Verify that a PEM certificate chains to the given CA.
pub fn verify_signed_by(cert_pem: &str, ca_cert_pem: &str) -> Result<bool> {
    let cert_der = parse_pem(cert_pem)?;
    let ca_der = parse_pem(ca_cert_pem)?;
    let (_, cert) = X509Certificate::from_der(&cert_der)
        .map_err(|e| Error::Cert(format!("failed to parse certificate: {e}")))?;
    let (_, ca) = X509Certificate::from_der(&ca_der)
        .map_err(|e| Error::Cert(format!("failed to parse CA certificate: {e}")))?;
    Ok(cert.verify_signature(Some(ca.public_key())).is_ok())
}

fn parse_pem(pem_data: &str) -> Result<Vec<u8>> {
    let obj = ::pem::parse(pem_data.as_bytes())
        .map_err(|e| Error::Cert(format!("failed to parse PEM: {e}")))?;
    Ok(obj.contents().to_vec())
}

fn validity_window(days: i64) -> (::time::OffsetDateTime, ::time::OffsetDateTime) {
    let now = ::time::OffsetDateTime::now_utc();
    (now, now + ::time::Duration::days(days))
}

// ============================================================================
// Cert manager
// ============================================================================

/// Reconciles the cluster CA and per-node certificate Secrets for an
/// assembly.
#[derive(Clone)]
pub struct CertManager {
    secrets: Arc<dyn ResourceStore<Secret>>,
    validity_days: i64,
}

impl CertManager {
    pub fn new(secrets: Arc<dyn ResourceStore<Secret>>) -> Self {
        Self {
            secrets,
            validity_days: DEFAULT_CERT_VALIDITY_DAYS,
        }
    }

    #[must_use]
    pub fn with_validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    /// Load the cluster CA for an assembly, creating it on first use.
    ///
    /// # Errors
    ///
    /// [`Error::Cert`] when an existing CA Secret is missing its key or
    /// certificate entry, or holds material that does not parse.
    pub async fn reconcile_cluster_ca(
        &self,
        namespace: &str,
        cluster: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<ClusterCa> {
        let secret_name = ca_secret_name(cluster);
        match self.secrets.get(namespace, &secret_name).await? {
            Some(secret) => {
                let cert = secret_entry(&secret, CA_CERT)?;
                let key = secret_entry(&secret, CA_KEY)?;
                ClusterCa::from_pem(&cert, &key, self.validity_days)
            }
            None => {
                info!(namespace, cluster, secret = %secret_name, "generating cluster CA");
                let ca = ClusterCa::generate(cluster, self.validity_days)?;
                let mut data = BTreeMap::new();
                data.insert(CA_CERT.to_string(), ByteString(ca.cert_pem().into()));
                data.insert(CA_KEY.to_string(), ByteString(ca.key_pem().into()));
                let secret = build_secret(namespace, &secret_name, labels, data);
                self.secrets.create(namespace, &secret).await?;
                Ok(ca)
            }
        }
    }

    /// Ensure the per-node certificate Secret covers every replica of a
    /// component.
    ///
    /// Entries for ordinals that already exist are preserved unchanged;
    /// only missing ordinals get new certificates. Returns the number of
    /// certificates issued.
    pub async fn reconcile_node_certs(
        &self,
        namespace: &str,
        component: &str,
        replicas: i32,
        labels: &BTreeMap<String, String>,
        ca: &ClusterCa,
    ) -> Result<usize> {
        let secret_name = node_certs_secret_name(component);
        let existing = self.secrets.get(namespace, &secret_name).await?;
        let mut data = existing
            .as_ref()
            .and_then(|s| s.data.clone())
            .unwrap_or_default();

        let mut issued = 0;
        for ordinal in 0..replicas {
            let pod = format!("{component}-{ordinal}");
            let cert_key = format!("{pod}.crt");
            if data.contains_key(&cert_key) {
                continue;
            }
            let sans = pod_sans(namespace, component, &pod);
            let (cert, key) = ca.issue_server_cert(&pod, &sans)?;
            data.insert(cert_key, ByteString(cert.into_bytes()));
            data.insert(format!("{pod}.key"), ByteString(key.into_bytes()));
            issued += 1;
        }

        if issued == 0 && existing.is_some() {
            debug!(namespace, component, "node certificates up to date");
            return Ok(0);
        }

        let secret = build_secret(namespace, &secret_name, labels, data);
        if existing.is_some() {
            self.secrets.apply(namespace, &secret_name, &secret).await?;
        } else {
            self.secrets.create(namespace, &secret).await?;
        }
        info!(namespace, component, issued, "issued node certificates");
        Ok(issued)
    }

    /// Re-issue every node certificate for a component from the given CA.
    ///
    /// Used after a CA renewal, when existing entries no longer chain to
    /// the distributed CA certificate.
    pub async fn renew_node_certs(
        &self,
        namespace: &str,
        component: &str,
        replicas: i32,
        labels: &BTreeMap<String, String>,
        ca: &ClusterCa,
    ) -> Result<usize> {
        let secret_name = node_certs_secret_name(component);
        let existing = self.secrets.get(namespace, &secret_name).await?;

        let mut data = BTreeMap::new();
        for ordinal in 0..replicas {
            let pod = format!("{component}-{ordinal}");
            let sans = pod_sans(namespace, component, &pod);
            let (cert, key) = ca.issue_server_cert(&pod, &sans)?;
            data.insert(format!("{pod}.crt"), ByteString(cert.into_bytes()));
            data.insert(format!("{pod}.key"), ByteString(key.into_bytes()));
        }

        let secret = build_secret(namespace, &secret_name, labels, data);
        if existing.is_some() {
            self.secrets.apply(namespace, &secret_name, &secret).await?;
        } else {
            self.secrets.create(namespace, &secret).await?;
        }
        info!(namespace, component, replicas, "renewed node certificates");
        Ok(replicas as usize)
    }
}

/// DNS names a broker or node presents on its per-pod certificate.
fn pod_sans(namespace: &str, component: &str, pod: &str) -> Vec<String> {
    let headless = format!("{component}-headless");
    vec![
        pod.to_string(),
        format!("{pod}.{headless}.{namespace}.svc"),
        format!("{pod}.{headless}.{namespace}.svc.cluster.local"),
        component.to_string(),
        format!("{component}.{namespace}.svc"),
        format!("{component}.{namespace}.svc.cluster.local"),
    ]
}

fn build_secret(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    data: BTreeMap<String, ByteString>,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

fn secret_entry(secret: &Secret, key: &str) -> Result<String> {
    let data = secret
        .data
        .as_ref()
        .ok_or_else(|| Error::Cert(format!("secret has no data, expected '{key}'")))?;
    let bytes = data
        .get(key)
        .ok_or_else(|| Error::Cert(format!("secret is missing entry '{key}'")))?;
    String::from_utf8(bytes.0.clone())
        .map_err(|e| Error::Cert(format!("secret entry '{key}' is not UTF-8: {e}")))
}

#[cfg(test)]
#[path = "certs_tests.rs"]
mod certs_tests;
