//! `#[finder(...)]` attribute parsing
//!
//! Container keys:
//! - `table = "invoices"`: marks the type persistable and names its table
//! - `crate = "::finder"`: path of the runtime crate in generated code
//!
//! Field keys:
//! - `skip`: the field is not persisted
//! - `primary_key`: the field is the primary key column
//! - `column = "..."`: column name when it differs from the field name
//! - `foreign_key = "..."`: local join column of a related entity field
//! - `mapped_by = "..."`: the related entity owns the join column (one-to-many)
//! - `base`: the field embeds the base record

use syn::{Attribute, LitStr};

const ATTRIBUTE: &str = "finder";

/// Container-level `#[finder(...)]` settings
#[derive(Debug, Default, Clone)]
pub struct ContainerAttrs {
    pub table: Option<String>,
    pub crate_path: Option<String>,
}

/// Field-level `#[finder(...)]` settings
#[derive(Debug, Default, Clone)]
pub struct FieldAttrs {
    pub skip: bool,
    pub primary_key: bool,
    pub column: Option<String>,
    pub foreign_key: Option<String>,
    pub mapped_by: Option<String>,
    pub base: bool,
}

pub fn is_finder_attr(attr: &Attribute) -> bool {
    attr.path().is_ident(ATTRIBUTE)
}

pub fn parse_container(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut parsed = ContainerAttrs::default();

    for attr in attrs.iter().filter(|attr| is_finder_attr(attr)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let table: LitStr = meta.value()?.parse()?;
                if table.value().trim().is_empty() {
                    return Err(meta.error("table name must not be empty"));
                }
                parsed.table = Some(table.value());
                Ok(())
            } else if meta.path.is_ident("crate") {
                let path: LitStr = meta.value()?.parse()?;
                parsed.crate_path = Some(path.value());
                Ok(())
            } else {
                Err(meta.error("unknown finder attribute, expected `table` or `crate`"))
            }
        })?;
    }

    Ok(parsed)
}

pub fn parse_field(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();

    for attr in attrs.iter().filter(|attr| is_finder_attr(attr)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                parsed.skip = true;
            } else if meta.path.is_ident("primary_key") {
                parsed.primary_key = true;
            } else if meta.path.is_ident("base") {
                parsed.base = true;
            } else if meta.path.is_ident("column") {
                parsed.column = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("foreign_key") {
                parsed.foreign_key = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("mapped_by") {
                parsed.mapped_by = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error(
                    "unknown finder field attribute, expected one of `skip`, `primary_key`, \
                     `column`, `foreign_key`, `mapped_by`, `base`",
                ));
            }
            Ok(())
        })?;
    }

    if parsed.foreign_key.is_some() && parsed.mapped_by.is_some() {
        let attr = attrs.iter().find(|attr| is_finder_attr(attr));
        let message = "`foreign_key` and `mapped_by` cannot be combined";
        return Err(match attr {
            Some(attr) => syn::Error::new_spanned(attr, message),
            None => syn::Error::new(proc_macro2::Span::call_site(), message),
        });
    }

    Ok(parsed)
}
