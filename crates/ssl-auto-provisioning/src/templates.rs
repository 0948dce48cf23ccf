//! nginx server-block generation
//!
//! Two shapes are produced for a domain: the bootstrap block, served while no
//! certificate exists yet, and the final block pair that terminates TLS with
//! the issued certificate. Both forward everything outside the ACME challenge
//! path to the local backend port.

use ssl_auto_core::SslAutoConfig;
use std::fmt::Write as _;

pub const ACME_CHALLENGE_PATH: &str = "/.well-known/acme-challenge/";

pub struct SiteTemplate<'a> {
    pub domain: &'a str,
    pub forward_port: u16,
    pub config: &'a SslAutoConfig,
}

impl<'a> SiteTemplate<'a> {
    pub fn new(domain: &'a str, forward_port: u16, config: &'a SslAutoConfig) -> Self {
        Self {
            domain,
            forward_port,
            config,
        }
    }

    /// HTTP-only configuration used until a certificate is issued
    pub fn bootstrap(&self) -> String {
        let mut out = String::new();
        out.push_str("server {\n");
        self.push_http_listen(&mut out);
        self.push_challenge_location(&mut out);
        self.push_proxy_location(&mut out);
        out.push_str("}\n");
        out
    }

    /// HTTP block plus HTTPS block referencing the issued certificate.
    ///
    /// With `ssl_redirect` the HTTP block answers everything except the
    /// challenge path with a permanent redirect, otherwise it keeps proxying.
    pub fn final_config(&self, ssl_redirect: bool) -> String {
        let config = self.config;
        let mut out = String::new();

        out.push_str("server {\n");
        self.push_http_listen(&mut out);
        self.push_challenge_location(&mut out);
        if ssl_redirect {
            out.push_str("    location / {\n");
            out.push_str("        return 301 https://$host$request_uri;\n");
            out.push_str("    }\n");
        } else {
            self.push_proxy_location(&mut out);
        }
        out.push_str("}\n\n");

        out.push_str("server {\n");
        let _ = writeln!(out, "    listen {} ssl;", config.https_port);
        let _ = writeln!(out, "    listen [::]:{} ssl;", config.https_port);
        let _ = writeln!(out, "    server_name {};", self.domain);
        let _ = writeln!(
            out,
            "    ssl_certificate {};",
            self.certificate_file("fullchain.pem")
        );
        let _ = writeln!(
            out,
            "    ssl_certificate_key {};",
            self.certificate_file("privkey.pem")
        );
        let _ = writeln!(
            out,
            "    ssl_trusted_certificate {};",
            self.certificate_file("chain.pem")
        );
        let _ = writeln!(out, "    ssl_protocols {};", config.ssl_protocols);
        let _ = writeln!(out, "    ssl_ciphers {};", config.ssl_ciphers);
        self.push_proxy_location(&mut out);
        out.push_str("}\n");
        out
    }

    fn certificate_file(&self, file: &str) -> String {
        self.config
            .live_certificate_path(self.domain, file)
            .display()
            .to_string()
    }

    fn push_http_listen(&self, out: &mut String) {
        let _ = writeln!(out, "    listen {};", self.config.http_port);
        let _ = writeln!(out, "    listen [::]:{};", self.config.http_port);
        let _ = writeln!(out, "    server_name {};", self.domain);
    }

    fn push_challenge_location(&self, out: &mut String) {
        let _ = writeln!(out, "    location {} {{", ACME_CHALLENGE_PATH);
        let _ = writeln!(out, "        root {};", self.config.webroot.display());
        out.push_str("    }\n");
    }

    fn push_proxy_location(&self, out: &mut String) {
        out.push_str("    location / {\n");
        let _ = writeln!(
            out,
            "        proxy_pass http://127.0.0.1:{};",
            self.forward_port
        );
        out.push_str("        proxy_set_header Host $host;\n");
        out.push_str("        proxy_set_header X-Real-IP $remote_addr;\n");
        out.push_str("        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n");
        out.push_str("        proxy_set_header X-Forwarded-Proto $scheme;\n");
        out.push_str("    }\n");
    }
}
