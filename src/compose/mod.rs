use anyhow::{Context, Result};
use serde_yaml::Value;

use crate::deploy::context::DeployContext;
use crate::host::Host;
use crate::output;

mod text;

const LOOPBACK: &str = "127.0.0.1";
const PUBLIC_PORT: u64 = 80;

/// A port binding that published host port 80.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebind {
    pub service: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortPatch {
    pub content: String,
    pub rebinds: Vec<Rebind>,
    /// Bindings on host port 80 still present after patching
    pub missed: usize,
    /// False when the document did not parse and the literal `80:80`
    /// substitution was used instead
    pub structured: bool,
}

impl PortPatch {
    pub fn changed(&self) -> bool {
        !self.rebinds.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    Short { service: String, spec: String, container: String },
    Long { service: String, target: String },
}

/// Rebind every service port published on host port 80 to
/// `127.0.0.1:<internal_port>`, keeping the container side. Only the
/// affected scalars change; every other byte of `source` is preserved.
pub fn patch_ports(source: &str, internal_port: u16) -> PortPatch {
    let doc: Value = match serde_yaml::from_str(source) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("compose file does not parse ({}), using literal substitution", e);
            return literal_patch(source, internal_port);
        }
    };

    let bindings = public_bindings(&doc);
    if bindings.is_empty() {
        return PortPatch {
            content: source.to_string(),
            rebinds: Vec::new(),
            missed: 0,
            structured: true,
        };
    }

    let mut lines: Vec<String> = source.split_inclusive('\n').map(str::to_string).collect();
    let mut rebinds = Vec::new();

    for binding in &bindings {
        match binding {
            Binding::Short {
                service,
                spec,
                container,
            } => {
                let to = format!("{}:{}:{}", LOOPBACK, internal_port, container);
                rebinds.push(Rebind {
                    service: service.clone(),
                    from: spec.clone(),
                    to: to.clone(),
                });
            }
            Binding::Long { service, target } => rebinds.push(Rebind {
                service: service.clone(),
                from: format!("published: 80 (target {})", target),
                to: format!("{}:{}:{}", LOOPBACK, internal_port, target),
            }),
        }
    }

    let mut seen = Vec::new();
    for rebind in &rebinds {
        if rebind.from.starts_with("published:") || seen.contains(&rebind.from) {
            continue;
        }
        seen.push(rebind.from.clone());
        for line in lines.iter_mut() {
            if let Some(rewritten) = text::rewrite_short(line, &rebind.from, &rebind.to) {
                *line = rewritten;
            }
        }
    }

    if bindings.iter().any(|b| matches!(b, Binding::Long { .. })) {
        text::rewrite_long(&mut lines, internal_port, LOOPBACK);
    }

    let content = lines.concat();
    match serde_yaml::from_str::<Value>(&content) {
        Ok(patched) => PortPatch {
            missed: public_bindings(&patched).len(),
            content,
            rebinds,
            structured: true,
        },
        // The edit broke the document; leave the file alone
        Err(e) => {
            tracing::warn!("patched compose file no longer parses: {}", e);
            PortPatch {
                content: source.to_string(),
                missed: bindings.len(),
                rebinds: Vec::new(),
                structured: true,
            }
        }
    }
}

fn literal_patch(source: &str, internal_port: u16) -> PortPatch {
    let to = format!("{}:{}:80", LOOPBACK, internal_port);
    let (content, count) = text::replace_token(source, "80:80", &to, |c| {
        !(c.is_ascii_digit() || c == ':' || c == '.')
    });

    let rebinds = (0..count)
        .map(|_| Rebind {
            service: "?".to_string(),
            from: "80:80".to_string(),
            to: to.clone(),
        })
        .collect();

    PortPatch {
        content,
        rebinds,
        missed: 0,
        structured: false,
    }
}

fn public_bindings(doc: &Value) -> Vec<Binding> {
    let Some(services) = doc.get("services").and_then(Value::as_mapping) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for (name, service) in services {
        let service_name = name.as_str().unwrap_or_default().to_string();
        let Some(ports) = service.get("ports").and_then(Value::as_sequence) else {
            continue;
        };

        for port in ports {
            match port {
                Value::String(spec) => {
                    if let Some(container) = short_container_port(spec) {
                        found.push(Binding::Short {
                            service: service_name.clone(),
                            spec: spec.clone(),
                            container,
                        });
                    }
                }
                Value::Mapping(long) => {
                    let published = long.get("published").is_some_and(is_public_port);
                    if published {
                        let target = long
                            .get("target")
                            .map(scalar_string)
                            .unwrap_or_else(|| PUBLIC_PORT.to_string());
                        found.push(Binding::Long {
                            service: service_name.clone(),
                            target,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    found
}

/// Container side of a short-syntax binding whose host port is 80:
/// `80:80`, `0.0.0.0:80:8080`, `80:80/tcp`
fn short_container_port(spec: &str) -> Option<String> {
    let (ports, proto) = match spec.split_once('/') {
        Some((ports, proto)) => (ports, format!("/{}", proto)),
        None => (spec, String::new()),
    };

    // IPv6 host addresses are bracketed: [::]:80:80
    let ports = match ports.strip_prefix('[') {
        Some(rest) => rest.split_once("]:")?.1,
        None => ports,
    };

    let parts: Vec<&str> = ports.split(':').collect();
    let (host, container) = match parts.as_slice() {
        [host, container] => (*host, *container),
        [_ip, host, container] => (*host, *container),
        _ => return None,
    };

    (host == "80").then(|| format!("{}{}", container, proto))
}

fn is_public_port(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_u64() == Some(PUBLIC_PORT),
        Value::String(s) => s == "80",
        _ => false,
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => PUBLIC_PORT.to_string(),
    }
}

/// Make the stack reachable only through loopback on the internal port.
pub async fn patch_stack<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    let path = ctx.config.compose_path();
    let source = host
        .read_file(&path)
        .await?
        .with_context(|| format!("Compose file not found: {}", path))?;

    let patch = patch_ports(&source, ctx.internal_port());

    if !patch.structured {
        output::warning("Compose file could not be parsed; patched the literal 80:80 binding");
    }

    if !patch.changed() {
        output::success("No service publishes port 80, compose file left as is");
        return Ok(());
    }

    host.write_file(&path, &patch.content)
        .await
        .with_context(|| format!("Failed to write {}", path))?;

    for rebind in &patch.rebinds {
        output::success(&format!("{}: {} → {}", rebind.service, rebind.from, rebind.to));
    }

    if patch.missed > 0 {
        output::warning(&format!(
            "{} binding(s) on host port 80 could not be rewritten in {}; edit them by hand",
            patch.missed, path
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"version: '3.7'

services:
  server:
    image: nginx
    restart: always
    env_file: env
    volumes:
      - ./config/nginx/in-vhost.conf:/etc/nginx/conf.d/in-vhost.conf:ro
    depends_on:
      - app
    ports:
      - "80:80"
      #- "443:443"
    networks:
      - invoiceninja

  app:
    image: invoiceninja/invoiceninja-debian:${TAG:-latest}
    env_file: env
    ports:
      - "9000"
"#;

    #[test]
    fn rewrites_public_binding_and_nothing_else() {
        let patch = patch_ports(STACK, 9001);

        assert!(patch.changed());
        assert_eq!(patch.missed, 0);
        assert_eq!(patch.content, STACK.replace("\"80:80\"", "\"127.0.0.1:9001:80\""));
        assert_eq!(
            patch.rebinds,
            vec![Rebind {
                service: "server".to_string(),
                from: "80:80".to_string(),
                to: "127.0.0.1:9001:80".to_string(),
            }]
        );
    }

    #[test]
    fn untouched_without_public_binding() {
        let source = "services:\n  web:\n    image: nginx\n    ports:\n      - \"8080:80\"\n";
        let patch = patch_ports(source, 9001);

        assert!(!patch.changed());
        assert_eq!(patch.content, source);
    }

    #[test]
    fn already_patched_file_is_stable() {
        let once = patch_ports(STACK, 9001).content;
        let twice = patch_ports(&once, 9001);

        assert!(!twice.changed());
        assert_eq!(twice.content, once);
    }

    #[test]
    fn host_ip_and_protocol_variants() {
        let source = "services:\n  web:\n    ports:\n      - 0.0.0.0:80:8080/tcp\n      - '443:443'\n";
        let patch = patch_ports(source, 9100);

        assert_eq!(
            patch.content,
            "services:\n  web:\n    ports:\n      - 127.0.0.1:9100:8080/tcp\n      - '443:443'\n"
        );
    }

    #[test]
    fn flow_sequence() {
        let source = "services:\n  web:\n    ports: [\"80:80\", \"443:443\"]\n";
        let patch = patch_ports(source, 9001);

        assert_eq!(
            patch.content,
            "services:\n  web:\n    ports: [\"127.0.0.1:9001:80\", \"443:443\"]\n"
        );
    }

    #[test]
    fn long_syntax_gets_loopback_host_ip() {
        let source = "services:\n  web:\n    ports:\n      - target: 80\n        published: 80\n        protocol: tcp\n";
        let patch = patch_ports(source, 9001);

        assert_eq!(patch.missed, 0);
        assert_eq!(
            patch.content,
            "services:\n  web:\n    ports:\n      - target: 80\n        published: 9001\n        host_ip: 127.0.0.1\n        protocol: tcp\n"
        );
    }

    #[test]
    fn long_syntax_existing_host_ip_is_replaced() {
        let source = "services:\n  web:\n    ports:\n      - host_ip: 0.0.0.0\n        published: \"80\"\n        target: 8080\n";
        let patch = patch_ports(source, 9001);

        assert_eq!(
            patch.content,
            "services:\n  web:\n    ports:\n      - host_ip: 127.0.0.1\n        published: 9001\n        target: 8080\n"
        );
        assert_eq!(patch.rebinds[0].to, "127.0.0.1:9001:8080");
    }

    #[test]
    fn unparseable_document_uses_literal_substitution() {
        let source = "services:\n  web:\n    ports:\n      - \"80:80\"\n      - \"8080:80\"\n  bad: [unclosed\n";
        let patch = patch_ports(source, 9001);

        assert!(!patch.structured);
        assert_eq!(patch.rebinds.len(), 1);
        assert!(patch.content.contains("\"127.0.0.1:9001:80\""));
        assert!(patch.content.contains("\"8080:80\""));
    }

    #[test]
    fn short_container_port_requires_host_80() {
        assert_eq!(short_container_port("80:80").as_deref(), Some("80"));
        assert_eq!(short_container_port("[::]:80:8080").as_deref(), Some("8080"));
        assert_eq!(short_container_port("8080:80"), None);
        assert_eq!(short_container_port("80"), None);
        assert_eq!(short_container_port("127.0.0.1:9001:80"), None);
    }
}
