// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, PathArguments, Type};

/// Field classification for code generation.
///
/// The closed set of shapes a serialized field can take. Widest primitives
/// sort first; reference-like fields (strings, arrays, node refs) sort
/// last, by name, matching the wire order the reader expects.
#[derive(Clone, PartialEq)]
enum FieldKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Char,
    /// `String`: inline UTF-8, value semantics.
    Str,
    /// `Vec<prim>`: inline primitive array. Carries the vec-method suffix
    /// ("u8", "f64", ...).
    Array(&'static str),
    /// `Option<NodeRef>`: shared node reference.
    Ref,
    /// `Vec<Option<NodeRef>>`: inline vector of node references.
    RefArray,
}

impl FieldKind {
    /// Group rank in wire order: widest primitive kinds first, then the
    /// narrower ones, then every reference-like field.
    fn rank(&self) -> u8 {
        match self {
            FieldKind::F64 => 0,
            FieldKind::U64 | FieldKind::I64 => 1,
            FieldKind::F32 => 2,
            FieldKind::U32 | FieldKind::I32 | FieldKind::Char => 3,
            FieldKind::I16 => 4,
            FieldKind::U16 => 5,
            FieldKind::U8 | FieldKind::I8 => 6,
            FieldKind::Bool => 7,
            FieldKind::Str | FieldKind::Array(_) | FieldKind::Ref | FieldKind::RefArray => 8,
        }
    }
}

struct FieldInfo {
    name: syn::Ident,
    kind: FieldKind,
}

/// Struct-level hook paths from `#[portable(...)]`.
#[derive(Default)]
struct Hooks {
    write_with: Option<syn::Path>,
    read_with: Option<syn::Path>,
    replace_with: Option<syn::Path>,
    resolve_with: Option<syn::Path>,
}

/// `#[derive(Portable)]`: generates the static `FieldPlan`, the default
/// field walk, blank construction, and the trait plumbing for one struct.
///
/// Supports:
/// - Primitive scalars: `bool`, `u8`, `i8`, `u16`, `i16`, `u32`, `i32`,
///   `u64`, `i64`, `f32`, `f64`, `char`
/// - `String`: inline UTF-8 string
/// - `Vec<prim>` for the eight wire kinds: inline primitive array
/// - `Option<NodeRef>`: shared node reference (handles, cycles)
/// - `Vec<Option<NodeRef>>`: inline vector of node references
///
/// Field attributes:
/// - `#[portable(skip)]` - field is not serialized; reconstructed blank
/// - `#[portable(base)]` - embedded base level, serialized before this
///   level's fields (at most one per struct)
///
/// Struct attributes:
/// - `#[portable(write_with = "path", read_with = "path")]` - custom hooks
///   replacing the default walk at this level; the generated
///   `write_default_fields`/`read_default_fields` run the default walk on
///   request
/// - `#[portable(replace_with = "path")]` - substitute another node before
///   serialization
/// - `#[portable(resolve_with = "path")]` - substitute another node after
///   reading
///
/// Example:
/// ```ignore
/// use graphwire::{NodeRef, Portable};
///
/// #[derive(Portable)]
/// struct Sensor {
///     id: u32,
///     value: f64,
///     label: String,
///     history: Vec<f64>,
///     peer: Option<NodeRef>,
/// }
/// ```
#[proc_macro_derive(Portable, attributes(portable))]
pub fn derive_portable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let name_str = name.to_string();

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(&input.generics, "Generic structs are not supported")
            .to_compile_error()
            .into();
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(f) => &f.named,
            _ => {
                return syn::Error::new_spanned(&input, "Only named fields are supported")
                    .to_compile_error()
                    .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Only structs are supported")
                .to_compile_error()
                .into()
        }
    };

    let hooks = match parse_hooks(&input.attrs) {
        Ok(hooks) => hooks,
        Err(err) => return err.to_compile_error().into(),
    };

    // Classify fields: the optional base level, serialized fields, and
    // skipped fields (blank on arrival).
    let mut base: Option<(syn::Ident, syn::Type)> = None;
    let mut infos = Vec::new();
    let mut vacant_inits = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            return syn::Error::new_spanned(field, "Field must have a name")
                .to_compile_error()
                .into();
        };
        let (is_skip, is_base) = match parse_field_flags(&field.attrs) {
            Ok(flags) => flags,
            Err(err) => return err.to_compile_error().into(),
        };
        if is_base {
            if is_skip {
                return syn::Error::new_spanned(field, "A base field cannot also be skipped")
                    .to_compile_error()
                    .into();
            }
            if base.is_some() {
                return syn::Error::new_spanned(field, "At most one base field is allowed")
                    .to_compile_error()
                    .into();
            }
            let base_ty = field.ty.clone();
            vacant_inits.push(quote! {
                #field_name: <#base_ty as ::graphwire::Described>::vacant()
            });
            base = Some((field_name.clone(), base_ty));
            continue;
        }
        if is_skip {
            vacant_inits.push(quote! {
                #field_name: ::core::default::Default::default()
            });
            continue;
        }
        let Some(kind) = classify(&field.ty) else {
            return syn::Error::new_spanned(
                &field.ty,
                "Unsupported field type. Supported: primitive scalars, char, String, \
                 Vec<prim>, Option<NodeRef>, Vec<Option<NodeRef>>.",
            )
            .to_compile_error()
            .into();
        };
        vacant_inits.push(vacant_init(field_name, &kind));
        infos.push(FieldInfo {
            name: field_name.clone(),
            kind,
        });
    }

    // Wire order: kind group (widest first), then field name.
    infos.sort_by(|a, b| {
        a.kind
            .rank()
            .cmp(&b.kind.rank())
            .then_with(|| a.name.to_string().cmp(&b.name.to_string()))
    });

    let field_specs: Vec<_> = infos.iter().map(|f| field_spec_tokens(f)).collect();
    let write_fields: Vec<_> = infos.iter().map(|f| write_field_tokens(f)).collect();
    let read_fields: Vec<_> = infos.iter().map(|f| read_field_tokens(f)).collect();

    let base_plan = match &base {
        Some((_, ty)) => quote! {
            ::core::option::Option::Some(<#ty as ::graphwire::Described>::plan_static)
        },
        None => quote! { ::core::option::Option::None },
    };
    let base_write = base.as_ref().map(|(ident, _)| {
        quote! { ::graphwire::Portable::write_body(&self.#ident, w)?; }
    });
    let base_read = base.as_ref().map(|(ident, _)| {
        quote! { ::graphwire::Portable::read_body(&mut self.#ident, r)?; }
    });

    let write_dispatch = match &hooks.write_with {
        Some(path) => quote! { #path(self, w) },
        None => quote! { self.write_default_fields(w) },
    };
    let read_dispatch = match &hooks.read_with {
        Some(path) => quote! { #path(self, r) },
        None => quote! { self.read_default_fields(r) },
    };

    let has_write_hook = hooks.write_with.is_some();
    let has_read_hook = hooks.read_with.is_some();
    let has_replace = hooks.replace_with.is_some();
    let has_resolve = hooks.resolve_with.is_some();

    let replacement_impl = hooks.replace_with.as_ref().map(|path| {
        quote! {
            fn write_replacement(&self) -> ::core::option::Option<::graphwire::NodeRef> {
                ::core::option::Option::Some(#path(self))
            }
        }
    });
    let resolve_impl = hooks.resolve_with.as_ref().map(|path| {
        quote! {
            fn resolve_hook() -> ::core::option::Option<
                fn(::graphwire::NodeRef) -> ::graphwire::NodeRef,
            > {
                ::core::option::Option::Some(#path)
            }
        }
    });

    let expanded = quote! {
        const _: () = {
            const FIELDS: &[::graphwire::FieldSpec] = &[ #(#field_specs),* ];

            static PLAN: ::graphwire::FieldPlan = ::graphwire::FieldPlan {
                type_name: ::core::concat!(::core::module_path!(), "::", #name_str),
                base: #base_plan,
                fields: FIELDS,
                has_write_hook: #has_write_hook,
                has_read_hook: #has_read_hook,
                has_replace: #has_replace,
                has_resolve: #has_resolve,
            };

            impl #name {
                /// Default field walk for this level only, in plan order.
                /// Custom hooks call this to fall back to the generated
                /// behavior.
                pub fn write_default_fields(
                    &self,
                    w: &mut ::graphwire::GraphWriter,
                ) -> ::graphwire::Result<()> {
                    #(#write_fields)*
                    ::core::result::Result::Ok(())
                }

                /// Mirror of `write_default_fields`.
                pub fn read_default_fields(
                    &mut self,
                    r: &mut ::graphwire::GraphReader,
                ) -> ::graphwire::Result<()> {
                    #(#read_fields)*
                    ::core::result::Result::Ok(())
                }
            }

            impl ::graphwire::Described for #name {
                fn plan_static() -> &'static ::graphwire::FieldPlan {
                    &PLAN
                }

                fn vacant() -> Self {
                    Self { #(#vacant_inits),* }
                }

                #resolve_impl
            }

            impl ::graphwire::Portable for #name {
                fn plan(&self) -> &'static ::graphwire::FieldPlan {
                    &PLAN
                }

                fn write_body(
                    &self,
                    w: &mut ::graphwire::GraphWriter,
                ) -> ::graphwire::Result<()> {
                    #base_write
                    #write_dispatch
                }

                fn read_body(
                    &mut self,
                    r: &mut ::graphwire::GraphReader,
                ) -> ::graphwire::Result<()> {
                    #base_read
                    #read_dispatch
                }

                #replacement_impl

                fn as_any(&self) -> &dyn ::core::any::Any {
                    self
                }

                fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                    self
                }
            }
        };
    };

    TokenStream::from(expanded)
}

/// Parses struct-level `#[portable(...)]` hook attributes.
fn parse_hooks(attrs: &[syn::Attribute]) -> syn::Result<Hooks> {
    let mut hooks = Hooks::default();
    for attr in attrs {
        if !attr.path().is_ident("portable") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let target = if meta.path.is_ident("write_with") {
                &mut hooks.write_with
            } else if meta.path.is_ident("read_with") {
                &mut hooks.read_with
            } else if meta.path.is_ident("replace_with") {
                &mut hooks.replace_with
            } else if meta.path.is_ident("resolve_with") {
                &mut hooks.resolve_with
            } else {
                return Err(meta.error(
                    "expected write_with, read_with, replace_with or resolve_with",
                ));
            };
            let lit: syn::LitStr = meta.value()?.parse()?;
            *target = Some(lit.parse()?);
            Ok(())
        })?;
    }
    Ok(hooks)
}

/// Parses field-level `#[portable(...)]` flags: (skip, base).
fn parse_field_flags(attrs: &[syn::Attribute]) -> syn::Result<(bool, bool)> {
    let mut skip = false;
    let mut base = false;
    for attr in attrs {
        if !attr.path().is_ident("portable") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else if meta.path.is_ident("base") {
                base = true;
                Ok(())
            } else {
                Err(meta.error("expected skip or base"))
            }
        })?;
    }
    Ok((skip, base))
}

/// Last path segment of a type, if it is a plain path type.
fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) => path.path.segments.last(),
        _ => None,
    }
}

/// Single generic argument of a segment like `Vec<T>` or `Option<T>`.
fn inner_type(segment: &syn::PathSegment) -> Option<&Type> {
    if let PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

fn is_node_ref(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|s| s.ident == "NodeRef")
}

/// Field kind for a Rust type, or `None` when unsupported.
fn classify(ty: &Type) -> Option<FieldKind> {
    let segment = last_segment(ty)?;
    match segment.ident.to_string().as_str() {
        "bool" => Some(FieldKind::Bool),
        "u8" => Some(FieldKind::U8),
        "i8" => Some(FieldKind::I8),
        "u16" => Some(FieldKind::U16),
        "i16" => Some(FieldKind::I16),
        "u32" => Some(FieldKind::U32),
        "i32" => Some(FieldKind::I32),
        "u64" => Some(FieldKind::U64),
        "i64" => Some(FieldKind::I64),
        "f32" => Some(FieldKind::F32),
        "f64" => Some(FieldKind::F64),
        "char" => Some(FieldKind::Char),
        "String" => Some(FieldKind::Str),
        "Option" => {
            if inner_type(segment).is_some_and(is_node_ref) {
                Some(FieldKind::Ref)
            } else {
                None
            }
        }
        "Vec" => {
            let inner = inner_type(segment)?;
            let inner_segment = last_segment(inner)?;
            match inner_segment.ident.to_string().as_str() {
                "bool" => Some(FieldKind::Array("bool")),
                "u8" => Some(FieldKind::Array("u8")),
                "u16" => Some(FieldKind::Array("u16")),
                "i16" => Some(FieldKind::Array("i16")),
                "i32" => Some(FieldKind::Array("i32")),
                "i64" => Some(FieldKind::Array("i64")),
                "f32" => Some(FieldKind::Array("f32")),
                "f64" => Some(FieldKind::Array("f64")),
                "Option" => {
                    if inner_type(inner_segment).is_some_and(is_node_ref) {
                        Some(FieldKind::RefArray)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// `FieldSpec` literal for the generated plan.
fn field_spec_tokens(field: &FieldInfo) -> proc_macro2::TokenStream {
    let name = field.name.to_string();
    let kind = match &field.kind {
        FieldKind::Bool => quote! { ::graphwire::FieldKind::Bool },
        FieldKind::U8 => quote! { ::graphwire::FieldKind::U8 },
        FieldKind::I8 => quote! { ::graphwire::FieldKind::I8 },
        FieldKind::U16 => quote! { ::graphwire::FieldKind::U16 },
        FieldKind::I16 => quote! { ::graphwire::FieldKind::I16 },
        FieldKind::U32 => quote! { ::graphwire::FieldKind::U32 },
        FieldKind::I32 => quote! { ::graphwire::FieldKind::I32 },
        FieldKind::U64 => quote! { ::graphwire::FieldKind::U64 },
        FieldKind::I64 => quote! { ::graphwire::FieldKind::I64 },
        FieldKind::F32 => quote! { ::graphwire::FieldKind::F32 },
        FieldKind::F64 => quote! { ::graphwire::FieldKind::F64 },
        FieldKind::Char => quote! { ::graphwire::FieldKind::Char },
        FieldKind::Str => quote! { ::graphwire::FieldKind::Str },
        FieldKind::Array(suffix) => {
            let prim = prim_kind_tokens(suffix);
            quote! { ::graphwire::FieldKind::Array(#prim) }
        }
        FieldKind::Ref => quote! { ::graphwire::FieldKind::Ref },
        FieldKind::RefArray => quote! { ::graphwire::FieldKind::RefArray },
    };
    quote! { ::graphwire::FieldSpec { name: #name, kind: #kind } }
}

fn prim_kind_tokens(suffix: &str) -> proc_macro2::TokenStream {
    match suffix {
        "bool" => quote! { ::graphwire::PrimKind::Bool },
        "u8" => quote! { ::graphwire::PrimKind::U8 },
        "u16" => quote! { ::graphwire::PrimKind::U16 },
        "i16" => quote! { ::graphwire::PrimKind::I16 },
        "i32" => quote! { ::graphwire::PrimKind::I32 },
        "i64" => quote! { ::graphwire::PrimKind::I64 },
        "f32" => quote! { ::graphwire::PrimKind::F32 },
        "f64" => quote! { ::graphwire::PrimKind::F64 },
        _ => quote! { compile_error!("unsupported primitive kind") },
    }
}

/// One field's statement inside `write_default_fields`.
fn write_field_tokens(field: &FieldInfo) -> proc_macro2::TokenStream {
    let name = &field.name;
    match &field.kind {
        FieldKind::Bool => quote! { w.write_bool(self.#name)?; },
        FieldKind::U8 => quote! { w.write_u8(self.#name)?; },
        FieldKind::I8 => quote! { w.write_i8(self.#name)?; },
        FieldKind::U16 => quote! { w.write_u16(self.#name)?; },
        FieldKind::I16 => quote! { w.write_i16(self.#name)?; },
        FieldKind::U32 => quote! { w.write_u32(self.#name)?; },
        FieldKind::I32 => quote! { w.write_i32(self.#name)?; },
        FieldKind::U64 => quote! { w.write_u64(self.#name)?; },
        FieldKind::I64 => quote! { w.write_i64(self.#name)?; },
        FieldKind::F32 => quote! { w.write_f32(self.#name)?; },
        FieldKind::F64 => quote! { w.write_f64(self.#name)?; },
        FieldKind::Char => quote! { w.write_char(self.#name)?; },
        FieldKind::Str => quote! {
            w.write_utf(::core::option::Option::Some(self.#name.as_str()))?;
        },
        FieldKind::Array(suffix) => {
            let method = quote::format_ident!("write_{}_vec", suffix);
            quote! { w.#method(&self.#name)?; }
        }
        FieldKind::Ref => quote! { w.write_node(self.#name.as_ref())?; },
        FieldKind::RefArray => quote! { w.write_node_slice(&self.#name)?; },
    }
}

/// One field's statement inside `read_default_fields`.
fn read_field_tokens(field: &FieldInfo) -> proc_macro2::TokenStream {
    let name = &field.name;
    match &field.kind {
        FieldKind::Bool => quote! { self.#name = r.read_bool()?; },
        FieldKind::U8 => quote! { self.#name = r.read_u8()?; },
        FieldKind::I8 => quote! { self.#name = r.read_i8()?; },
        FieldKind::U16 => quote! { self.#name = r.read_u16()?; },
        FieldKind::I16 => quote! { self.#name = r.read_i16()?; },
        FieldKind::U32 => quote! { self.#name = r.read_u32()?; },
        FieldKind::I32 => quote! { self.#name = r.read_i32()?; },
        FieldKind::U64 => quote! { self.#name = r.read_u64()?; },
        FieldKind::I64 => quote! { self.#name = r.read_i64()?; },
        FieldKind::F32 => quote! { self.#name = r.read_f32()?; },
        FieldKind::F64 => quote! { self.#name = r.read_f64()?; },
        FieldKind::Char => quote! { self.#name = r.read_char()?; },
        FieldKind::Str => quote! { self.#name = r.read_string()?; },
        FieldKind::Array(suffix) => {
            let method = quote::format_ident!("read_{}_vec", suffix);
            quote! { self.#name = r.#method()?; }
        }
        FieldKind::Ref => quote! { self.#name = r.read_node()?; },
        FieldKind::RefArray => quote! { self.#name = r.read_node_vec()?; },
    }
}

/// Zero-value initializer for one serialized field in `vacant()`.
fn vacant_init(name: &syn::Ident, kind: &FieldKind) -> proc_macro2::TokenStream {
    match kind {
        FieldKind::Bool => quote! { #name: false },
        FieldKind::U8
        | FieldKind::I8
        | FieldKind::U16
        | FieldKind::I16
        | FieldKind::U32
        | FieldKind::I32
        | FieldKind::U64
        | FieldKind::I64 => quote! { #name: 0 },
        FieldKind::F32 | FieldKind::F64 => quote! { #name: 0.0 },
        FieldKind::Char => quote! { #name: '\0' },
        FieldKind::Str => quote! { #name: ::std::string::String::new() },
        FieldKind::Array(_) | FieldKind::RefArray => quote! { #name: ::std::vec::Vec::new() },
        FieldKind::Ref => quote! { #name: ::core::option::Option::None },
    }
}
