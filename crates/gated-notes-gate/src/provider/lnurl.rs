//! LNURL-pay provider.
//!
//! Resolves `local@domain` through `https://domain/.well-known/lnurlp/local`
//! (LUD-16), mints through the advertised callback (LUD-06, comments per
//! LUD-12) and checks settlement through the `verify` URL (LUD-21).

use std::str::FromStr;

use gated_notes::Lud16;
use lightning_invoice::Bolt11Invoice;
use serde::Deserialize;
use url::Url;

use super::{Invoice, PayeeInfo, PaymentProvider, ProviderError};
use crate::validation::{check_public_https, resolve_public_https};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayRequest {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    callback: Option<String>,
    #[serde(default)]
    min_sendable: Option<u64>,
    #[serde(default)]
    max_sendable: Option<u64>,
    #[serde(default)]
    comment_allowed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    pr: Option<String>,
    #[serde(default)]
    verify: Option<String>,
    #[serde(default)]
    routes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    settled: Option<bool>,
}

fn is_error_status(status: &Option<String>) -> bool {
    status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("ERROR"))
}

fn rejected(reason: Option<String>) -> ProviderError {
    ProviderError::Rejected(reason.unwrap_or_else(|| "no reason given".to_string()))
}

/// Extract the hex payment hash from a BOLT-11 request, checking it asks
/// for exactly `amount_msat`.
pub(crate) fn payment_hash_of(pr: &str, amount_msat: u64) -> Result<String, ProviderError> {
    let invoice = Bolt11Invoice::from_str(pr)
        .map_err(|e| ProviderError::BadResponse(format!("invalid bolt11 invoice: {e}")))?;

    if invoice.amount_milli_satoshis() != Some(amount_msat) {
        return Err(ProviderError::BadResponse(format!(
            "invoice amount {:?} msat does not match requested {amount_msat}",
            invoice.amount_milli_satoshis()
        )));
    }

    Ok(invoice.payment_hash().to_string())
}

/// Parse a provider-supplied URL and refuse anything that is not public HTTPS.
///
/// Where the host resolves is checked again in `get_json`, right before the
/// request goes out.
fn provider_url(raw: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(raw)
        .map_err(|_| ProviderError::BadResponse(format!("invalid URL from provider: {raw}")))?;
    check_public_https(&url).map_err(ProviderError::BadResponse)?;
    Ok(url)
}

pub struct LnurlProvider {
    client: reqwest::Client,
}

impl LnurlProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProviderError::Unreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Use an existing client. It should not follow redirects.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        resolve_public_https(&url)
            .await
            .map_err(ProviderError::BadResponse)?;

        let host = url.host_str().unwrap_or_default().to_string();
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable(format!("request to {host} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ProviderError::Unreachable(format!(
                "{host} answered {}",
                resp.status()
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::BadResponse(format!("{host} sent unparsable JSON: {e}")))
    }
}

impl PaymentProvider for LnurlProvider {
    async fn resolve_payee(&self, payee: &Lud16) -> Result<PayeeInfo, ProviderError> {
        let url = provider_url(&payee.metadata_url())?;
        let meta: PayRequest = self.get_json(url).await?;

        if is_error_status(&meta.status) {
            return Err(rejected(meta.reason));
        }
        if meta.tag.as_deref() != Some("payRequest") {
            return Err(ProviderError::BadResponse(format!(
                "{payee} is not an LNURL-pay endpoint"
            )));
        }

        let (Some(callback), Some(min_sendable), Some(max_sendable)) =
            (meta.callback, meta.min_sendable, meta.max_sendable)
        else {
            return Err(ProviderError::BadResponse(format!(
                "{payee} metadata is missing callback or sendable range"
            )));
        };

        Ok(PayeeInfo {
            callback,
            min_sendable,
            max_sendable,
            comment_allowed: meta.comment_allowed.unwrap_or(0),
        })
    }

    async fn mint_invoice(
        &self,
        payee: &Lud16,
        amount_msat: u64,
        memo: &str,
    ) -> Result<Invoice, ProviderError> {
        let info = self.resolve_payee(payee).await?;
        if !info.accepts(amount_msat) {
            return Err(ProviderError::Rejected(format!(
                "{payee} accepts {}..={} msat, not {amount_msat}",
                info.min_sendable, info.max_sendable
            )));
        }

        let mut callback = provider_url(&info.callback)?;
        {
            let mut query = callback.query_pairs_mut();
            query.append_pair("amount", &amount_msat.to_string());
            if info.comment_allowed > 0 && !memo.is_empty() {
                let limit = usize::try_from(info.comment_allowed).unwrap_or(usize::MAX);
                let comment: String = memo.chars().take(limit).collect();
                query.append_pair("comment", &comment);
            }
        }

        let resp: CallbackResponse = self.get_json(callback).await?;
        if is_error_status(&resp.status) {
            return Err(rejected(resp.reason));
        }

        let pr = resp
            .pr
            .filter(|pr| !pr.is_empty())
            .ok_or_else(|| ProviderError::BadResponse("callback returned no invoice".to_string()))?;
        let verify = resp.verify.filter(|v| !v.is_empty()).ok_or_else(|| {
            ProviderError::BadResponse(format!("{payee} does not offer a verify URL"))
        })?;
        let payment_hash = payment_hash_of(&pr, amount_msat)?;

        tracing::debug!(payee = %payee, payment_hash = %payment_hash, "minted invoice");

        Ok(Invoice {
            pr,
            payment_hash,
            verify,
            status: resp.status,
            routes: resp.routes,
        })
    }

    async fn check_settled(&self, verify: &str) -> Result<bool, ProviderError> {
        let resp: VerifyResponse = self.get_json(provider_url(verify)?).await?;
        if is_error_status(&resp.status) {
            return Err(rejected(resp.reason));
        }
        resp.settled.ok_or_else(|| {
            ProviderError::BadResponse("verify response has no 'settled'".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bitcoin::hashes::{sha256, Hash};
    use bitcoin::secp256k1::{Secp256k1, SecretKey};
    use lightning_invoice::{Currency, InvoiceBuilder, PaymentSecret};

    fn signed_invoice(hash: [u8; 32], amount_msat: u64) -> String {
        let key = SecretKey::from_slice(&[0x42; 32]).unwrap();
        InvoiceBuilder::new(Currency::Bitcoin)
            .description("Unlock gated note".to_string())
            .payment_hash(sha256::Hash::from_byte_array(hash))
            .payment_secret(PaymentSecret([7; 32]))
            .duration_since_epoch(Duration::from_secs(1_700_000_000))
            .min_final_cltv_expiry_delta(144)
            .amount_milli_satoshis(amount_msat)
            .build_signed(|msg| Secp256k1::new().sign_ecdsa_recoverable(msg, &key))
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_payment_hash_from_signed_invoice() {
        let mut hash = [0u8; 32];
        for (i, byte) in hash.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let pr = signed_invoice(hash, 5_000);

        assert_eq!(payment_hash_of(&pr, 5_000).unwrap(), hex::encode(hash));
    }

    #[test]
    fn test_payment_hash_rejects_amount_mismatch() {
        let pr = signed_invoice([9; 32], 5_000);

        let err = payment_hash_of(&pr, 2_100).unwrap_err();
        assert!(
            matches!(err, ProviderError::BadResponse(ref msg) if msg.contains("2100")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_requests_to_private_hosts_are_refused() {
        let provider = LnurlProvider::new().unwrap();
        for verify in ["https://127.0.0.1/verify", "https://[fd00::1]/verify"] {
            assert!(matches!(
                provider.check_settled(verify).await,
                Err(ProviderError::BadResponse(_))
            ));
        }
    }

    #[test]
    fn test_payment_hash_rejects_garbage() {
        assert!(matches!(
            payment_hash_of("lnbc-not-an-invoice", 1000),
            Err(ProviderError::BadResponse(_))
        ));
        assert!(matches!(payment_hash_of("", 1000), Err(ProviderError::BadResponse(_))));
    }

    #[test]
    fn test_provider_url_requires_public_https() {
        assert!(provider_url("https://wallet.example.com/lnurlp/cb").is_ok());
        assert!(provider_url("http://wallet.example.com/lnurlp/cb").is_err());
        assert!(provider_url("https://127.0.0.1/cb").is_err());
        assert!(provider_url("https://localhost/cb").is_err());
        assert!(provider_url("not a url").is_err());
    }

    #[test]
    fn test_pay_request_parsing() {
        let meta: PayRequest = serde_json::from_value(serde_json::json!({
            "tag": "payRequest",
            "callback": "https://wallet.example.com/cb",
            "minSendable": 1000,
            "maxSendable": 100000000,
            "metadata": "[[\"text/plain\",\"hi\"]]",
            "commentAllowed": 255
        }))
        .unwrap();
        assert_eq!(meta.tag.as_deref(), Some("payRequest"));
        assert_eq!(meta.min_sendable, Some(1000));
        assert_eq!(meta.comment_allowed, Some(255));
    }

    #[test]
    fn test_error_status_detection() {
        let resp: CallbackResponse = serde_json::from_value(serde_json::json!({
            "status": "ERROR",
            "reason": "amount too low"
        }))
        .unwrap();
        assert!(is_error_status(&resp.status));
        assert!(!is_error_status(&Some("OK".to_string())));
        assert!(!is_error_status(&None));
    }

    #[test]
    fn test_payee_range() {
        let info = PayeeInfo {
            callback: "https://wallet.example.com/cb".into(),
            min_sendable: 1000,
            max_sendable: 5000,
            comment_allowed: 0,
        };
        assert!(info.accepts(1000));
        assert!(info.accepts(5000));
        assert!(!info.accepts(999));
        assert!(!info.accepts(5001));
    }
}
