use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslMethod, SslOptions};

use crate::io_buf::IoBuffer;
use crate::stream::TlsStream;
use crate::{Config, Credentials, DtlsVersion, Error};

/// Build a client-side DTLS engine.
///
/// Nothing here touches the network, so every configuration or credential
/// problem surfaces before a socket exists.
pub(crate) fn dtls_client(
    config: &Config,
    credentials: &dyn Credentials,
) -> Result<TlsStream<IoBuffer>, Error> {
    let context = dtls_create_ctx(config, credentials)?;
    let ssl = dtls_ssl_create(&context, config)?;
    Ok(TlsStream::new(ssl, IoBuffer::default()))
}

fn dtls_create_ctx(config: &Config, credentials: &dyn Credentials) -> Result<SslContext, Error> {
    credentials.check()?;

    let version = config.dtls_version();
    let mut ctx = SslContextBuilder::new(SslMethod::dtls())?;

    // Pin exactly the configured version.
    ctx.set_min_proto_version(Some(version.ssl_version()))?;
    ctx.set_max_proto_version(Some(version.ssl_version()))?;

    let mut ciphers = config
        .cipher_list()
        .unwrap_or_else(|| credentials.cipher_list())
        .to_string();
    if version == DtlsVersion::V1_0 {
        // OpenSSL 3 refuses DTLS 1.0 at the default security level.
        ciphers.push_str(":@SECLEVEL=0");
    }
    ctx.set_cipher_list(&ciphers)?;

    credentials.apply(&mut ctx)?;

    // No resumption or renegotiation, each transport does one full handshake.
    let mut options = SslOptions::empty();
    options.insert(SslOptions::SINGLE_ECDH_USE);
    options.insert(SslOptions::NO_TICKET);
    options.insert(SslOptions::NO_RENEGOTIATION);
    ctx.set_options(options);

    debug!("DTLS context for {} with ciphers {}", version, ciphers);

    Ok(ctx.build())
}

fn dtls_ssl_create(ctx: &SslContext, config: &Config) -> Result<Ssl, Error> {
    let mut ssl = Ssl::new(ctx)?;
    ssl.set_mtu(config.mtu() as u32)?;
    Ok(ssl)
}
