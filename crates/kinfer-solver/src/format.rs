//! Human-readable rendering of types for logs and diagnostics.

use crate::env::TypeEnvironment;
use crate::types::{IntrinsicKind, ProjectionKind, TypeArg, TypeData, TypeId};

pub struct TypeFormatter<'a> {
    env: &'a TypeEnvironment,
}

impl<'a> TypeFormatter<'a> {
    pub fn new(env: &'a TypeEnvironment) -> Self {
        TypeFormatter { env }
    }

    pub fn format(&self, ty: TypeId) -> String {
        let mut out = String::new();
        self.write_type(ty, &mut out);
        out
    }

    pub fn format_list(&self, types: &[TypeId]) -> String {
        let parts: Vec<String> = types.iter().map(|&ty| self.format(ty)).collect();
        format!("[{}]", parts.join(", "))
    }

    fn write_type(&self, ty: TypeId, out: &mut String) {
        let Some(data) = self.env.interner.lookup(ty) else {
            out.push_str("<unknown>");
            return;
        };
        match data {
            TypeData::Intrinsic(kind) => out.push_str(match kind {
                IntrinsicKind::Error => "<error>",
                IntrinsicKind::Any => "Any",
                IntrinsicKind::Nothing => "Nothing",
                IntrinsicKind::Unit => "Unit",
            }),
            TypeData::Class { class, args } => {
                out.push_str(&self.env.class_name(class));
                let args = self.env.interner.type_args(args);
                if !args.is_empty() {
                    out.push('<');
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_arg(*arg, out);
                    }
                    out.push('>');
                }
            }
            TypeData::Variable(var) => out.push_str(&self.env.variable_name(var)),
            TypeData::Stub(var) => {
                out.push_str("Stub(");
                out.push_str(&self.env.variable_name(var));
                out.push(')');
            }
            TypeData::Captured(captured) => {
                out.push_str("Captured(");
                self.write_arg(
                    TypeArg {
                        projection: captured.projection,
                        ty: captured.ty,
                    },
                    out,
                );
                out.push(')');
            }
            TypeData::Param { class, index } => {
                let name = self
                    .env
                    .classes
                    .get(class)
                    .and_then(|info| info.type_params.get(index as usize).map(|p| p.name))
                    .map(|atom| self.env.names.resolve(atom).to_string())
                    .unwrap_or_else(|| format!("#{index}"));
                out.push_str(&name);
            }
            TypeData::IntegerLiteral(value) => {
                out.push_str(&format!("ILT({value})"));
            }
            TypeData::Intersection(list) => {
                let members = self.env.interner.type_list(list);
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" & ");
                    }
                    self.write_type(*member, out);
                }
            }
        }
    }

    fn write_arg(&self, arg: TypeArg, out: &mut String) {
        match arg.projection {
            ProjectionKind::Star => out.push('*'),
            ProjectionKind::In => {
                out.push_str("in ");
                self.write_type(arg.ty, out);
            }
            ProjectionKind::Out => {
                out.push_str("out ");
                self.write_type(arg.ty, out);
            }
            ProjectionKind::Invariant => self.write_type(arg.ty, out),
        }
    }
}
