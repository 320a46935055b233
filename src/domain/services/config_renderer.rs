//! Config Renderer Service
//!
//! Renders a routing model into HAProxy configuration text.
//!
//! The output is hashed for change signalling and compared byte for byte
//! in tests, so whitespace and section order are part of the contract:
//! header, then backends in model order, then one frontend per port in
//! ascending port order.

use crate::domain::entities::{PortSpec, RoutingModel};
use crate::domain::errors::RenderError;
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;
use std::fmt;

/// Offset added to a backend port to get the frontend bind port.
pub const FRONTEND_PORT_OFFSET: u32 = 10000;

/// Kind of HAProxy section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Frontend,
    Backend,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
        }
    }
}

/// One named HAProxy section with its attribute lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub name: String,
    pub attributes: Vec<String>,
}

impl Section {
    pub fn new(kind: SectionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn push(&mut self, attribute: impl Into<String>) {
        self.attributes.push(attribute.into());
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\n{} {}\n", self.kind.as_str(), self.name)?;
        for attribute in &self.attributes {
            writeln!(f, "  {}", attribute)?;
        }
        Ok(())
    }
}

/// Rendered configuration and its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    pub content: String,
    /// Lowercase hex SHA-512 of `content`
    pub hash: String,
}

/// HAProxy configuration renderer.
pub struct ConfigRenderer;

impl ConfigRenderer {
    /// Name of the shared frontend for a port.
    pub fn frontend_name(port: u16) -> String {
        format!("dynaconfig-fe-{}", port)
    }

    /// Name of the backend for a (base domain, port) pair.
    pub fn backend_name(base_domain: &str, port: u16) -> String {
        format!("{}-{}", base_domain, port)
    }

    /// TCP frontend with the SNI inspection preamble.
    pub fn create_frontend(name: &str, port: &PortSpec) -> Section {
        let mut section = Section::new(SectionKind::Frontend, name);
        section.push("mode tcp");
        section.push(format!(
            "bind 0.0.0.0:{}",
            FRONTEND_PORT_OFFSET + u32::from(port.port)
        ));
        section.push("tcp-request content accept if { req_ssl_hello_type 1 }");
        section.push("tcp-request inspect-delay 5000");
        section
    }

    /// TCP backend with one health-checked server per target.
    pub fn create_backend(name: &str, port: &PortSpec) -> Section {
        let mut section = Section::new(SectionKind::Backend, name);
        section.push("mode tcp");
        for target in &port.targets {
            section.push(format!(
                "server {target}-{port} {target}:{port} check verify none",
                target = target,
                port = port.port
            ));
        }
        section
    }

    /// Route from a frontend to a backend.
    ///
    /// Ports with a matcher select on the SNI suffix; others route
    /// unconditionally.
    pub fn add_switching_rule(
        base_domain: &str,
        frontend: &mut Section,
        backend: &Section,
        port: &PortSpec,
    ) {
        if port.matcher().is_some() {
            frontend.push(format!(
                "use_backend {} if {{ req.ssl_sni -m end .{} }}",
                backend.name, base_domain
            ));
        } else {
            frontend.push(format!("use_backend {}", backend.name));
        }
    }

    /// Render the generated sections, without the header.
    pub fn render_sections(model: &RoutingModel) -> Result<String, RenderError> {
        let mut backends = Vec::new();
        let mut frontends: BTreeMap<u16, Section> = BTreeMap::new();

        for range in &model.ranges {
            if range.base_domain.is_empty() {
                continue;
            }
            if range.base_domain.chars().any(char::is_whitespace) {
                return Err(RenderError::InvalidBaseDomain(range.base_domain.clone()));
            }

            for port in range.monitor_ports.iter().filter(|p| !p.targets.is_empty()) {
                if port.port == 0 {
                    return Err(RenderError::InvalidPort(range.base_domain.clone()));
                }

                let backend =
                    Self::create_backend(&Self::backend_name(&range.base_domain, port.port), port);
                let frontend = frontends.entry(port.port).or_insert_with(|| {
                    Self::create_frontend(&Self::frontend_name(port.port), port)
                });
                Self::add_switching_rule(&range.base_domain, frontend, &backend, port);

                backends.push(backend);
            }
        }

        let mut out = String::new();
        for section in backends.iter().chain(frontends.values()) {
            out.push_str(&section.to_string());
        }
        Ok(out)
    }

    /// Render the full configuration and hash it.
    pub fn render(model: &RoutingModel) -> Result<RenderedConfig, RenderError> {
        let mut content = String::with_capacity(model.header.len());
        content.push_str(&model.header);
        content.push_str(&Self::render_sections(model)?);

        let hash = content_hash(&content);
        Ok(RenderedConfig { content, hash })
    }
}

/// Lowercase hex SHA-512 of the rendered text.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
