// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! SPNEGO (`Negotiate`) tokens from the ambient Kerberos credential cache.

use base64::{engine::general_purpose::STANDARD, Engine};
use libgssapi::{
    context::{ClientCtx, CtxFlags},
    credential::{Cred, CredUsage},
    name::Name,
    oid::{OidSet, GSS_MECH_KRB5, GSS_NT_HOSTBASED_SERVICE},
};

use crate::error::TransmissionError;

fn signing_error(e: impl std::fmt::Display) -> TransmissionError {
    TransmissionError::Signing(format!("kerberos: {e}"))
}

// The server's reply token is never read, so mutual auth is not requested.
fn context_flags() -> CtxFlags {
    CtxFlags::empty()
}

/// `Authorization` header value for the `HTTP@host` service principal.
pub fn negotiate_header(host: &str) -> Result<String, TransmissionError> {
    let service = Name::new(
        format!("HTTP@{host}").as_bytes(),
        Some(&GSS_NT_HOSTBASED_SERVICE),
    )
    .map_err(signing_error)?;
    let service = service
        .canonicalize(Some(&GSS_MECH_KRB5))
        .map_err(signing_error)?;

    let mut mechs = OidSet::new().map_err(signing_error)?;
    mechs.add(&GSS_MECH_KRB5).map_err(signing_error)?;
    let cred =
        Cred::acquire(None, None, CredUsage::Initiate, Some(&mechs)).map_err(signing_error)?;

    let mut ctx = ClientCtx::new(
        Some(cred),
        service,
        context_flags(),
        Some(&GSS_MECH_KRB5),
    );
    let token = ctx
        .step(None, None)
        .map_err(signing_error)?
        .ok_or_else(|| signing_error("no initial token produced"))?;

    Ok(format!("Negotiate {}", STANDARD.encode(&*token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutual_authentication_not_requested() {
        assert!(!context_flags().contains(CtxFlags::GSS_C_MUTUAL_FLAG));
    }
}
