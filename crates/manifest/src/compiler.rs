//! Catalog compiler - manifest + parameters + facts into a catalog
//!
//! Compilation never touches the host. Given the same manifest, inputs and
//! facts it produces the same catalog, resource for resource.

use crate::condition;
use crate::error::{CompileError, Result};
use crate::facts::HostFacts;
use crate::params::{ParamInputs, Params, describe, resolve_params};
use crate::render::{self, Renderer};
use crate::types::{Manifest, RelationshipDecl, ResourceDecl};
use declarative::{Catalog, Ensure, Relationship, Resource, ResourceKind, ResourceRef};
use serde_json::{Map, Value};
use tera::Context;

/// Compile a manifest into a catalog for one host
pub fn compile(manifest: &Manifest, inputs: &ParamInputs, facts: &HostFacts) -> Result<Catalog> {
    let params = resolve_params(&manifest.params, inputs, facts)?;
    let renderer = Renderer::new(&manifest.templates).map_err(|message| CompileError::Template {
        origin: manifest.origin(),
        message,
    })?;

    let compiler = Compiler {
        renderer,
        base: base_scope(&params, facts),
    };

    let mut catalog = Catalog::new(manifest.class.name.clone());
    for (index, decl) in manifest.resources.iter().enumerate() {
        for resource in compiler.expand(index, decl)? {
            log::trace!("compiled {resource}");
            catalog.add(resource)?;
        }
    }
    for (index, decl) in manifest.relationships.iter().enumerate() {
        if let Some(relationship) = compiler.relationship(index, decl)? {
            catalog.relate(relationship);
        }
    }

    log::debug!(
        "compiled class {} into {} resources and {} relationships",
        manifest.class.name,
        catalog.len(),
        catalog.relationships().len()
    );
    Ok(catalog)
}

fn base_scope(params: &Params, facts: &HostFacts) -> Map<String, Value> {
    let mut scope = params.clone();
    scope.insert("facts".to_string(), facts.to_value());
    scope
}

struct Compiler {
    renderer: Renderer,
    base: Map<String, Value>,
}

/// One expansion of a declaration: its scope and tera context
struct Frame {
    scope: Value,
    context: Context,
    origin: String,
}

impl Compiler {
    fn frame(&self, origin: String, item: Option<Value>) -> Result<Frame> {
        let mut scope = self.base.clone();
        if let Some(item) = item {
            scope.insert("item".to_string(), item);
        }
        let scope = Value::Object(scope);
        let context = render::context(&scope).map_err(|message| CompileError::Template {
            origin: origin.clone(),
            message,
        })?;
        Ok(Frame {
            scope,
            context,
            origin,
        })
    }

    /// The values `for_each` iterates over; maps yield `{key, value}` in key order
    fn items(&self, origin: &str, expression: &str) -> Result<Vec<Value>> {
        let scope = Value::Object(self.base.clone());
        let err = |message: String| CompileError::ForEach {
            origin: origin.to_string(),
            expression: expression.to_string(),
            message,
        };

        let path: Vec<String> = expression.trim().split('.').map(str::to_string).collect();
        let value = condition::lookup(&scope, &path).map_err(err)?;
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items.clone()),
            Value::Object(map) => Ok(map
                .iter()
                .map(|(key, value)| {
                    let mut entry = Map::new();
                    entry.insert("key".to_string(), Value::String(key.clone()));
                    entry.insert("value".to_string(), value.clone());
                    Value::Object(entry)
                })
                .collect()),
            other => Err(err(format!("expected a list or map, got {}", describe(other)))),
        }
    }

    fn expand(&self, index: usize, decl: &ResourceDecl) -> Result<Vec<Resource>> {
        let origin = format!("resource #{} ({} {})", index + 1, decl.kind, decl.title);
        let kind: ResourceKind = decl.kind.parse().map_err(|message| CompileError::InvalidResource {
            origin: origin.clone(),
            message,
        })?;
        if decl.content.is_some() && decl.template.is_some() {
            return Err(CompileError::InvalidResource {
                origin,
                message: "'content' and 'template' are mutually exclusive".to_string(),
            });
        }

        let frames = match &decl.for_each {
            None => vec![self.frame(origin, None)?],
            Some(expression) => self
                .items(&origin, expression)?
                .into_iter()
                .enumerate()
                .map(|(i, item)| self.frame(format!("{origin}[{i}]"), Some(item)))
                .collect::<Result<Vec<_>>>()?,
        };

        let mut resources = Vec::with_capacity(frames.len());
        for frame in frames {
            if let Some(expression) = &decl.when
                && !self.condition(&frame, expression)?
            {
                log::trace!("{}: condition '{expression}' is false", frame.origin);
                continue;
            }
            resources.push(self.resource(kind, decl, &frame)?);
        }
        Ok(resources)
    }

    fn condition(&self, frame: &Frame, expression: &str) -> Result<bool> {
        condition::evaluate(expression, &frame.scope).map_err(|message| CompileError::Condition {
            origin: frame.origin.clone(),
            expression: expression.to_string(),
            message,
        })
    }

    fn render(&self, frame: &Frame, text: &str) -> Result<String> {
        self.renderer
            .render_str(text, &frame.context)
            .map_err(|message| CompileError::Template {
                origin: frame.origin.clone(),
                message,
            })
    }

    fn reference(&self, frame: &Frame, text: &str) -> Result<ResourceRef> {
        let rendered = self.render(frame, text)?;
        rendered
            .parse()
            .map_err(|message| CompileError::InvalidReference {
                origin: frame.origin.clone(),
                message,
            })
    }

    fn references(&self, frame: &Frame, texts: &[String]) -> Result<Vec<ResourceRef>> {
        texts.iter().map(|t| self.reference(frame, t)).collect()
    }

    fn resource(&self, kind: ResourceKind, decl: &ResourceDecl, frame: &Frame) -> Result<Resource> {
        let invalid = |message: String| CompileError::InvalidResource {
            origin: frame.origin.clone(),
            message,
        };

        let title = self.render(frame, &decl.title)?;
        if title.trim().is_empty() {
            return Err(invalid("title renders to an empty string".to_string()));
        }

        let mut resource = Resource::new(kind, title);
        if let Some(ensure) = &decl.ensure {
            resource.ensure = Ensure::from(self.render(frame, ensure)?.trim());
        }

        for (key, value) in &decl.properties {
            let text = match value {
                toml::Value::String(s) => self.render(frame, s)?,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                _ => return Err(invalid(format!("property '{key}' must be a scalar"))),
            };
            resource.properties.insert(key.clone(), text);
        }

        if let Some(content) = &decl.content {
            let rendered = self.render(frame, content)?;
            resource.properties.insert("content".to_string(), rendered);
        }
        if let Some(template) = &decl.template {
            let rendered = self
                .renderer
                .render_template(template, &frame.context)
                .map_err(|message| CompileError::Template {
                    origin: format!("{} ({template})", frame.origin),
                    message,
                })?;
            resource.properties.insert("content".to_string(), rendered);
        }

        for alias in &decl.aliases {
            resource.aliases.insert(self.render(frame, alias)?);
        }
        resource.require = self.references(frame, &decl.require)?;
        resource.before = self.references(frame, &decl.before)?;
        resource.notify = self.references(frame, &decl.notify)?;
        resource.subscribe = self.references(frame, &decl.subscribe)?;

        Ok(resource)
    }

    fn relationship(&self, index: usize, decl: &RelationshipDecl) -> Result<Option<Relationship>> {
        let frame = self.frame(format!("relationship #{}", index + 1), None)?;
        if let Some(expression) = &decl.when
            && !self.condition(&frame, expression)?
        {
            return Ok(None);
        }
        Ok(Some(Relationship::new(
            self.reference(&frame, &decl.source)?,
            self.reference(&frame, &decl.target)?,
            decl.kind,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{OS_FAMILY, SELINUX_ENFORCING};
    use declarative::RelationshipKind;
    use serde_json::json;

    const WEB: &str = r#"
[class]
name = "web"

[params.conf_dir]
type = "string"
default = "/etc/web"

[params.vhosts]
type = "map"
default = { "a.example" = 8080, "b.example" = 8081 }

[params.packages]
type = "list"
default = ["web", "web-doc"]

[params.extra]
optional = true

[[resource]]
type = "package"
for_each = "packages"
title = "{{ item }}"

[[resource]]
type = "file"
for_each = "vhosts"
title = "{{ conf_dir }}/sites/{{ item.key }}.conf"
content = "listen {{ item.value }};\n"
require = ["Package[web]"]
notify = ["Service[web]"]

[[resource]]
type = "service"
title = "web"
aliases = ["httpd"]
properties = { enable = true }

[[resource]]
type = "file"
title = "{{ conf_dir }}/extra.conf"
when = "extra != null"
content = "{{ extra }}"

[[relationship]]
source = "Package[web-doc]"
target = "Service[httpd]"
"#;

    fn compile_web(inputs: &ParamInputs) -> Result<Catalog> {
        compile(&Manifest::parse(WEB).unwrap(), inputs, &HostFacts::new())
    }

    #[test]
    fn test_for_each_over_list_and_map() {
        let catalog = compile_web(&ParamInputs::new()).unwrap();
        let titles: Vec<String> = catalog.resources().iter().map(ToString::to_string).collect();
        assert_eq!(
            titles,
            vec![
                "Package[web]",
                "Package[web-doc]",
                "File[/etc/web/sites/a.example.conf]",
                "File[/etc/web/sites/b.example.conf]",
                "Service[web]",
            ]
        );
        let vhost = catalog.get(&"File[/etc/web/sites/b.example.conf]".parse().unwrap()).unwrap();
        assert_eq!(vhost.property("content"), Some("listen 8081;\n"));
        assert_eq!(vhost.notify[0].to_string(), "Service[web]");
    }

    #[test]
    fn test_scalar_properties_and_aliases() {
        let catalog = compile_web(&ParamInputs::new()).unwrap();
        let service = catalog.get(&"Service[httpd]".parse().unwrap()).unwrap();
        assert_eq!(service.property("enable"), Some("true"));
        assert_eq!(service.ensure, Ensure::Running);
        assert_eq!(catalog.relationships()[0].kind, RelationshipKind::Require);
    }

    #[test]
    fn test_optional_param_enables_resource() {
        let inputs = ParamInputs::new().with("extra", "gzip on;");
        let catalog = compile_web(&inputs).unwrap();
        let extra = catalog.get(&"File[/etc/web/extra.conf]".parse().unwrap()).unwrap();
        assert_eq!(extra.property("content"), Some("gzip on;"));
    }

    #[test]
    fn test_condition_on_facts_and_item() {
        let manifest = Manifest::parse(
            r#"
[class]
name = "se"

[params.selboolean_on]
default = ["httpd_can_network_connect", "httpd_setrlimit"]

[[resource]]
type = "boolean"
for_each = "selboolean_on"
when = "facts.selinux_enforcing && item != 'httpd_setrlimit'"
title = "{{ item }}"
properties = { value = "on" }
"#,
        )
        .unwrap();

        let off = HostFacts::new().with(SELINUX_ENFORCING, false);
        assert!(compile(&manifest, &ParamInputs::new(), &off).unwrap().is_empty());

        let on = HostFacts::new().with(SELINUX_ENFORCING, true);
        let catalog = compile(&manifest, &ParamInputs::new(), &on).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.resources()[0].title, "httpd_can_network_connect");
    }

    #[test]
    fn test_errors() {
        let err = compile_web(&ParamInputs::new().with("packages", "web")).unwrap_err();
        assert!(matches!(err, CompileError::ParameterType { .. }));

        let bad_kind = Manifest::parse("[class]\nname = \"x\"\n[[resource]]\ntype = \"user\"\ntitle = \"bob\"\n").unwrap();
        assert!(matches!(
            compile(&bad_kind, &ParamInputs::new(), &HostFacts::new()),
            Err(CompileError::InvalidResource { .. })
        ));

        let undefined = Manifest::parse("[class]\nname = \"x\"\n[[resource]]\ntype = \"file\"\ntitle = \"{{ nope }}\"\n").unwrap();
        assert!(matches!(
            compile(&undefined, &ParamInputs::new(), &HostFacts::new()),
            Err(CompileError::Template { .. })
        ));

        let unknown_var = Manifest::parse("[class]\nname = \"x\"\n[[resource]]\ntype = \"file\"\ntitle = \"/a\"\nwhen = \"nope\"\n").unwrap();
        assert!(matches!(
            compile(&unknown_var, &ParamInputs::new(), &HostFacts::new()),
            Err(CompileError::Condition { .. })
        ));

        let bad_ref = Manifest::parse("[class]\nname = \"x\"\n[[resource]]\ntype = \"file\"\ntitle = \"/a\"\nrequire = [\"nginx\"]\n").unwrap();
        assert!(matches!(
            compile(&bad_ref, &ParamInputs::new(), &HostFacts::new()),
            Err(CompileError::InvalidReference { .. })
        ));

        let dup = Manifest::parse("[class]\nname = \"x\"\n[[resource]]\ntype = \"package\"\ntitle = \"a\"\n[[resource]]\ntype = \"package\"\ntitle = \"a\"\n").unwrap();
        assert!(matches!(
            compile(&dup, &ParamInputs::new(), &HostFacts::new()),
            Err(CompileError::Catalog(_))
        ));
    }

    #[test]
    fn test_for_each_over_scalar_rejected() {
        let manifest = Manifest::parse(
            "[class]\nname = \"x\"\n[params.n]\ndefault = 3\n[[resource]]\ntype = \"package\"\nfor_each = \"n\"\ntitle = \"{{ item }}\"\n",
        )
        .unwrap();
        let err = compile(&manifest, &ParamInputs::new(), &HostFacts::new()).unwrap_err();
        assert!(err.to_string().contains("expected a list or map"));
    }

    #[test]
    fn test_os_family_in_template() {
        let manifest = Manifest::parse(
            "[class]\nname = \"x\"\n[[resource]]\ntype = \"file\"\ntitle = \"/etc/{{ facts.os_family | lower }}.txt\"\n",
        )
        .unwrap();
        let facts = HostFacts::new().with(OS_FAMILY, "Debian");
        let catalog = compile(&manifest, &ParamInputs::new(), &facts).unwrap();
        assert_eq!(catalog.resources()[0].title, "/etc/debian.txt");
        assert_eq!(json!(catalog.resources()[0].kind), json!("file"));
    }
}
