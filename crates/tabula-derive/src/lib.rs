//! Derive macros for tabula entity mappings.
//!
//! This crate provides `#[derive(Entity)]`, which turns a struct into a
//! declarative mapping description, and `#[derive(SqlEnum)]`, which stores
//! a fieldless enum as its discriminant.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, Ident,
    Lit, LitStr, Meta, UnOp,
};

/// Derives `tabula_core::entity::Entity` for a struct.
///
/// # Attributes
///
/// - `#[entity(table = "table_name")]` - Stores the struct in a table
///   (optional, defaults to snake_case of struct name)
/// - `#[entity(view = "SELECT ...")]` - Backs the struct by a view with
///   this definition; `name = "..."` sets the view name
///
/// # Field Attributes
///
/// - `#[column(name = "column_name")]` - Overrides the column name
///   (defaults to the lower-cased field name)
/// - `#[column(primary_key)]`, `#[column(autoincrement)]`
/// - `#[column(not_null)]`, `#[column(nullable)]` - Override nullability
/// - `#[column(default = <literal>)]` - Declared default value
/// - `#[column(default_expr = "CURRENT_TIMESTAMP")]` - Raw SQL default
/// - `#[column(index)]`, `#[column(index = "group")]` - Index membership
/// - `#[column(unique)]`, `#[column(unique = "group")]` - Uniqueness
/// - `#[column(size = 80)]` - Type size
/// - `#[column(enum_repr = "i32")]` - Stores an enum field as that integer
/// - `#[column(ignore)]` - Not stored
///
/// `index` and `unique` may be repeated to join several groups. Every
/// stored field must be `Clone` and implement `ToSqlValue`.
///
/// # Generated Items
///
/// For a struct `User`, this macro generates:
///
/// - `impl Entity for User`
/// - `UserFields` - Property accessors returning `Expr` (`UserFields::name()`)
#[proc_macro_derive(Entity, attributes(entity, column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_entity_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives `tabula_core::value::ToSqlValue` for a fieldless enum, storing
/// its discriminant as an integer.
#[proc_macro_derive(SqlEnum)]
pub fn derive_sql_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_sql_enum_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_entity_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let entity = parse_entity_attrs(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity derive only supports structs",
            ));
        }
    };

    let mut field_mappings = Vec::new();
    let mut values = Vec::new();
    let mut accessors = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = ident.unraw().to_string();
        let field_type = &field.ty;
        let rust_type = quote!(#field_type).to_string().replace(' ', "");
        let attrs = parse_column_attrs(&field.attrs)?;

        field_mappings.push(attrs.to_mapping(&field_name, &rust_type));

        if attrs.ignore {
            continue;
        }
        values.push(quote! {
            (
                #field_name,
                ::tabula_core::value::ToSqlValue::to_sql_value(
                    ::core::clone::Clone::clone(&self.#ident),
                ),
            )
        });
        accessors.push(quote! {
            /// Property reference for use in expressions.
            #[inline]
            pub fn #ident() -> ::tabula_core::expr::Expr {
                ::tabula_core::expr::prop(#field_name)
            }
        });
    }

    let fields_struct_name = format_ident!("{}Fields", struct_name);
    let name = &entity.name;
    let constructor = match &entity.view {
        Some(definition) => quote! {
            ::tabula_core::entity::EntityMapping::view(#name, #definition)
        },
        None => quote! {
            ::tabula_core::entity::EntityMapping::table(#name)
        },
    };

    let expanded = quote! {
        impl ::tabula_core::entity::Entity for #struct_name {
            fn mapping() -> ::tabula_core::entity::EntityMapping {
                #constructor
                    #(.field(#field_mappings))*
            }

            fn to_values(&self) -> ::std::vec::Vec<(&'static str, ::tabula_core::value::SqlValue)> {
                ::std::vec![#(#values),*]
            }
        }

        /// Property accessors for `#struct_name`.
        #[derive(Debug, Clone, Copy)]
        pub struct #fields_struct_name;

        impl #fields_struct_name {
            #(#accessors)*
        }
    };

    Ok(expanded)
}

fn derive_sql_enum_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let enum_name = &input.ident;
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input,
            "SqlEnum derive only supports enums",
        ));
    };
    if let Some(variant) = data
        .variants
        .iter()
        .find(|v| !matches!(v.fields, Fields::Unit))
    {
        return Err(syn::Error::new_spanned(
            variant,
            "SqlEnum derive only supports fieldless variants",
        ));
    }

    Ok(quote! {
        impl ::tabula_core::value::ToSqlValue for #enum_name {
            fn to_sql_value(self) -> ::tabula_core::value::SqlValue {
                ::tabula_core::value::SqlValue::Int(self as i64)
            }
        }
    })
}

struct EntityAttrs {
    name: String,
    view: Option<String>,
}

#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    primary_key: bool,
    autoincrement: bool,
    not_null: Option<bool>,
    default: Option<TokenStream2>,
    size: Option<u32>,
    enum_repr: Option<String>,
    indexes: Vec<Option<String>>,
    uniques: Vec<Option<String>>,
    ignore: bool,
}

impl ColumnAttrs {
    fn to_mapping(&self, field_name: &str, rust_type: &str) -> TokenStream2 {
        let mut calls = Vec::new();
        if let Some(name) = &self.name {
            calls.push(quote!(.column(#name)));
        }
        if self.primary_key {
            calls.push(quote!(.primary_key()));
        }
        if self.autoincrement {
            calls.push(quote!(.autoincrement()));
        }
        match self.not_null {
            Some(true) => calls.push(quote!(.not_null())),
            Some(false) => calls.push(quote!(.nullable())),
            None => {}
        }
        if let Some(default) = &self.default {
            calls.push(quote!(.default(#default)));
        }
        if let Some(size) = self.size {
            calls.push(quote!(.size(#size)));
        }
        if let Some(repr) = &self.enum_repr {
            calls.push(quote!(.enum_repr(#repr)));
        }
        for group in &self.indexes {
            calls.push(match group {
                Some(name) => quote!(.index_named(#name)),
                None => quote!(.index()),
            });
        }
        for group in &self.uniques {
            calls.push(match group {
                Some(name) => quote!(.unique_named(#name)),
                None => quote!(.unique()),
            });
        }
        if self.ignore {
            calls.push(quote!(.ignore()));
        }

        quote! {
            ::tabula_core::entity::FieldMapping::new(#field_name, #rust_type) #(#calls)*
        }
    }
}

fn parse_entity_attrs(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<EntityAttrs> {
    let mut name = None;
    let mut view = None;

    for attr in attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") || meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    name = Some(value.value());
                } else if meta.path.is_ident("view") {
                    let value: LitStr = meta.value()?.parse()?;
                    view = Some(value.value());
                } else {
                    return Err(meta.error("unknown entity attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(EntityAttrs {
        // Default to snake_case of struct name
        name: name.unwrap_or_else(|| to_snake_case(&struct_name.to_string())),
        view,
    })
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs {
        if attr.path().is_ident("column") {
            // Handle empty attribute like #[column]
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    result.primary_key = true;
                } else if meta.path.is_ident("autoincrement") {
                    result.autoincrement = true;
                } else if meta.path.is_ident("not_null") {
                    result.not_null = Some(true);
                } else if meta.path.is_ident("nullable") {
                    result.not_null = Some(false);
                } else if meta.path.is_ident("ignore") {
                    result.ignore = true;
                } else if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else if meta.path.is_ident("enum_repr") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.enum_repr = Some(value.value());
                } else if meta.path.is_ident("size") {
                    let value: syn::LitInt = meta.value()?.parse()?;
                    result.size = Some(value.base10_parse()?);
                } else if meta.path.is_ident("default") {
                    let value: Expr = meta.value()?.parse()?;
                    result.default = Some(default_value(&value)?);
                } else if meta.path.is_ident("default_expr") {
                    let value: LitStr = meta.value()?.parse()?;
                    let sql = value.value();
                    result.default = Some(quote! {
                        ::tabula_core::value::DefaultValue::Expression(
                            ::std::string::String::from(#sql),
                        )
                    });
                } else if meta.path.is_ident("index") {
                    result.indexes.push(optional_group(&meta)?);
                } else if meta.path.is_ident("unique") {
                    result.uniques.push(optional_group(&meta)?);
                } else {
                    return Err(meta.error("unknown column attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(result)
}

/// `index` alone or `index = "group"`.
fn optional_group(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<Option<String>> {
    if meta.input.peek(syn::Token![=]) {
        let value: LitStr = meta.value()?.parse()?;
        Ok(Some(value.value()))
    } else {
        Ok(None)
    }
}

/// Turns a literal (optionally negated) into a `DefaultValue` constructor.
fn default_value(expr: &Expr) -> syn::Result<TokenStream2> {
    let (lit, negative) = match expr {
        Expr::Lit(ExprLit { lit, .. }) => (lit, false),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr: inner,
            ..
        }) => match inner.as_ref() {
            Expr::Lit(ExprLit { lit, .. }) => (lit, true),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "default must be a literal; use default_expr for SQL expressions",
                ));
            }
        },
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "default must be a literal; use default_expr for SQL expressions",
            ));
        }
    };

    let tokens = match lit {
        Lit::Bool(b) if !negative => {
            let value = b.value;
            quote!(::tabula_core::value::DefaultValue::Bool(#value))
        }
        Lit::Int(i) => {
            let value: i64 = i.base10_parse()?;
            let value = if negative { -value } else { value };
            quote!(::tabula_core::value::DefaultValue::Integer(#value))
        }
        Lit::Float(f) => {
            let value: f64 = f.base10_parse()?;
            let value = if negative { -value } else { value };
            quote!(::tabula_core::value::DefaultValue::Float(#value))
        }
        Lit::Str(s) if !negative => {
            let value = s.value();
            quote! {
                ::tabula_core::value::DefaultValue::String(::std::string::String::from(#value))
            }
        }
        other => {
            return Err(syn::Error::new_spanned(other, "unsupported default literal"));
        }
    };
    Ok(tokens)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
