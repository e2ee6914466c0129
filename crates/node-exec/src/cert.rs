//! Test certificate generation and PEM bundle handling
//!
//! The probes add a throwaway certificate to the cluster's user CA bundle and
//! then check that every node imported it into its machine root store.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use pem::{EncodeConfig, LineEnding, Pem};
use rcgen::{
    CertificateParams, DistinguishedName, DnType, DnValue, ExtendedKeyUsagePurpose, KeyIdMethod,
    KeyPair, KeyUsagePurpose, SanType, SerialNumber,
};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ExecResult;

const VALIDITY_YEARS: i32 = 10;

/// Generate a new self-signed PEM-encoded certificate valid for ten years.
pub fn generate_certificate() -> ExecResult<String> {
    let mut params = CertificateParams::default();
    params.serial_number = Some(SerialNumber::from_slice(&[33]));

    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String("New Test Cert Org.".to_string()),
    );
    dn.push(DnType::CountryName, DnValue::Utf8String("US".to_string()));
    dn.push(
        DnType::StateOrProvinceName,
        DnValue::Utf8String("MA".to_string()),
    );
    dn.push(
        DnType::LocalityName,
        DnValue::Utf8String("Boston".to_string()),
    );
    // streetAddress (2.5.4.9) and postalCode (2.5.4.17)
    dn.push(
        DnType::CustomDnType(vec![2, 5, 4, 9]),
        DnValue::Utf8String("New Test Cert St.".to_string()),
    );
    dn.push(
        DnType::CustomDnType(vec![2, 5, 4, 17]),
        DnValue::Utf8String("02115".to_string()),
    );
    params.distinguished_name = dn;

    params.subject_alt_names = vec![
        SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        SanType::IpAddress(IpAddr::V6(Ipv6Addr::LOCALHOST)),
    ];
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];
    params.key_identifier_method = KeyIdMethod::PreSpecified(vec![1, 2, 3, 4, 6]);

    set_validity(&mut params, Utc::now());

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;
    let pem = cert.pem();
    debug!(fingerprint = %fingerprint(&pem)?, "generated test certificate");
    Ok(pem)
}

/// Valid from `now` (whole seconds) for ten years.
///
/// A Feb 29 start ends on Mar 1 when the end year is not a leap year.
fn set_validity(params: &mut CertificateParams, now: DateTime<Utc>) {
    let since_midnight = Duration::from_secs(u64::from(now.num_seconds_from_midnight()));
    let (year, month, day) = (now.year(), now.month(), now.day());
    params.not_before = rcgen::date_time_ymd(year, month as u8, day as u8) + since_midnight;

    let end_year = year + VALIDITY_YEARS;
    let (end_month, end_day) = match NaiveDate::from_ymd_opt(end_year, month, day) {
        Some(_) => (month, day),
        None => (3, 1),
    };
    params.not_after =
        rcgen::date_time_ymd(end_year, end_month as u8, end_day as u8) + since_midnight;
}

/// Split a PEM bundle into one PEM string per block, in bundle order.
pub fn split_bundle(bundle: &str) -> ExecResult<Vec<String>> {
    Ok(pem::parse_many(bundle)?
        .iter()
        .map(|block| {
            pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF))
        })
        .collect())
}

/// SHA-256 fingerprint (lowercase hex) of the first PEM block's contents.
pub fn fingerprint(cert_pem: &str) -> ExecResult<String> {
    let block: Pem = pem::parse(cert_pem)?;
    Ok(hex::encode(Sha256::digest(block.contents())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_certificate_is_pem() {
        let pem = generate_certificate().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(pem.trim_end().ends_with("-----END CERTIFICATE-----"));
    }

    #[test]
    fn test_validity_starts_now() {
        let mut params = CertificateParams::default();
        let now = Utc::now();
        set_validity(&mut params, now);

        assert!(params.not_before.unix_timestamp() <= Utc::now().timestamp());
        assert_eq!(params.not_before.unix_timestamp(), now.timestamp());
        assert!(params.not_after > params.not_before);
    }

    #[test]
    fn test_validity_on_last_evening_of_year() {
        let mut params = CertificateParams::default();
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 20, 0, 0).unwrap();
        set_validity(&mut params, now);

        let evening = Duration::from_secs(20 * 3600);
        assert_eq!(params.not_before, rcgen::date_time_ymd(2025, 12, 31) + evening);
        assert_eq!(params.not_before.unix_timestamp(), 1_767_211_200);
        assert_eq!(params.not_after, rcgen::date_time_ymd(2035, 12, 31) + evening);
    }

    #[test]
    fn test_validity_from_leap_day() {
        let mut params = CertificateParams::default();
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 9, 30, 0).unwrap();
        set_validity(&mut params, now);

        let morning = Duration::from_secs(9 * 3600 + 30 * 60);
        assert_eq!(params.not_before, rcgen::date_time_ymd(2024, 2, 29) + morning);
        assert_eq!(params.not_after, rcgen::date_time_ymd(2034, 3, 1) + morning);
    }

    #[test]
    fn test_generated_certificates_differ() {
        let a = generate_certificate().unwrap();
        let b = generate_certificate().unwrap();
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_split_bundle_preserves_order() {
        let a = generate_certificate().unwrap();
        let b = generate_certificate().unwrap();
        let bundle = format!("{a}{b}");

        let parts = split_bundle(&bundle).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(fingerprint(&parts[0]).unwrap(), fingerprint(&a).unwrap());
        assert_eq!(fingerprint(&parts[1]).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_split_empty_bundle() {
        assert!(split_bundle("").unwrap().is_empty());
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let pem = generate_certificate().unwrap();
        let fp = fingerprint(&pem).unwrap();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_rejects_garbage() {
        assert!(fingerprint("not a certificate").is_err());
    }
}
