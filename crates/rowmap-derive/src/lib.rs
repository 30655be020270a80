//! Derive macro for rowmap record schemas.
//!
//! `#[derive(Record)]` implements `rowmap_core::Record` by emitting the
//! `SchemaBuilder` calls a hand-written `describe` would contain.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitInt, LitStr};

/// Derives `rowmap_core::Record` for a struct with named fields.
///
/// # Attributes
///
/// - `#[record(table = "name")]` - table name (defaults to the snake_case of
///   the struct name)
/// - `#[record(option = "WITHOUT ROWID")]` - table option, repeatable
/// - `#[record(comment = "...")]` - table comment
///
/// # Field Attributes
///
/// - `#[column(name = "col")]` - column name (defaults to the field name)
/// - `#[column(size = 64)]` - declared size
/// - `#[column(unique)]`, `#[column(primary_key)]`, `#[column(auto_increment)]`
/// - `#[column(default = "expr")]` - raw SQL default expression
/// - `#[column(index)]`, `#[column(index_class = "UNIQUE")]`
/// - `#[column(not_null)]`, `#[column(nullable)]`
/// - `#[column(kind = "int")]` - explicit storage kind
/// - `#[column(json)]` - store the field as one JSON column
/// - `#[column(embed)]` - flatten a nested record; with `name` it is stored
///   as one JSON column instead
/// - `#[column(skip)]` - not mapped
#[proc_macro_derive(Record, attributes(record, column))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_record_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_record_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let record = parse_record_attrs(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Record derive only supports structs",
            ));
        }
    };

    let mut statements: Vec<TokenStream2> = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_column_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let get = quote! { |r| &r.#ident };
        let get_mut = quote! { |r| &mut r.#ident };

        if attrs.embed && attrs.name.is_none() {
            statements.push(quote! {
                schema.embed(#get, #get_mut);
            });
            continue;
        }

        let column = attrs.name.clone().unwrap_or_else(|| ident.to_string());
        let call = if attrs.embed || attrs.json {
            quote! { schema.json(#column, #get, #get_mut) }
        } else if let Some(kind) = &attrs.kind {
            quote! { schema.field_as(#column, #kind, #get, #get_mut) }
        } else {
            quote! { schema.field(#column, #get, #get_mut) }
        };
        let options = attrs.options();
        statements.push(quote! {
            let _ = #call #(#options)*;
        });
    }

    let table = &record.table;
    let options = &record.options;
    let comment = record.comment.iter();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::rowmap_core::Record for #struct_name #ty_generics #where_clause {
            fn table_name() -> ::std::string::String {
                ::std::string::String::from(#table)
            }

            fn describe(schema: &mut ::rowmap_core::SchemaBuilder<Self>) {
                #(#statements)*
                #(schema.table_option(#options);)*
                #(schema.comment(#comment);)*
            }
        }
    })
}

struct RecordAttrs {
    table: String,
    options: Vec<String>,
    comment: Option<String>,
}

#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    size: Option<u32>,
    unique: bool,
    default_expr: Option<String>,
    primary_key: bool,
    auto_increment: bool,
    index: bool,
    index_class: Option<String>,
    not_null: bool,
    nullable: bool,
    kind: Option<String>,
    json: bool,
    embed: bool,
    skip: bool,
}

impl ColumnAttrs {
    fn options(&self) -> Vec<TokenStream2> {
        let mut out = Vec::new();
        if let Some(size) = self.size {
            out.push(quote! { .size(#size) });
        }
        if self.unique {
            out.push(quote! { .unique() });
        }
        if let Some(expr) = &self.default_expr {
            out.push(quote! { .default(#expr) });
        }
        if self.primary_key {
            out.push(quote! { .primary_key() });
        }
        if self.auto_increment {
            out.push(quote! { .auto_increment() });
        }
        if let Some(class) = &self.index_class {
            out.push(quote! { .index_class(#class) });
        } else if self.index {
            out.push(quote! { .index() });
        }
        if self.not_null {
            out.push(quote! { .not_null() });
        }
        if self.nullable {
            out.push(quote! { .nullable() });
        }
        out
    }
}

fn parse_record_attrs(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<RecordAttrs> {
    let mut result = RecordAttrs {
        table: to_snake_case(&struct_name.to_string()),
        options: Vec::new(),
        comment: None,
    };
    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                result.table = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("option") {
                result.options.push(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("comment") {
                result.comment = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("unsupported record attribute"));
            }
            Ok(())
        })?;
    }
    Ok(result)
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let path = &meta.path;
            if path.is_ident("name") {
                result.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if path.is_ident("size") {
                result.size = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
            } else if path.is_ident("unique") {
                result.unique = true;
            } else if path.is_ident("default") {
                result.default_expr = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if path.is_ident("primary_key") {
                result.primary_key = true;
            } else if path.is_ident("auto_increment") {
                result.auto_increment = true;
            } else if path.is_ident("index") {
                result.index = true;
            } else if path.is_ident("index_class") {
                result.index_class = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if path.is_ident("not_null") {
                result.not_null = true;
            } else if path.is_ident("nullable") {
                result.nullable = true;
            } else if path.is_ident("kind") {
                result.kind = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if path.is_ident("json") {
                result.json = true;
            } else if path.is_ident("embed") {
                result.embed = true;
            } else if path.is_ident("skip") {
                result.skip = true;
            } else {
                return Err(meta.error("unsupported column attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || acronym_end {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
