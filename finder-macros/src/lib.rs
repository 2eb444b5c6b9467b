//! Procedural macros for Finder
//!
//! - `#[derive(Finder)]` - Generate the typed finder API for an entity
//! - `#[entity]` - Mark an entity for build-script generation

use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Attribute, DeriveInput, Item, Path, Token};

use finder_codegen::GenerationError;

/// Generate the typed finder API for a persistable struct.
///
/// # Usage
///
/// ```ignore
/// #[derive(Debug, Clone, Finder)]
/// #[finder(table = "invoices")]
/// pub struct Invoice {
///     pub id: i64,
///     pub total: f64,
///     pub issued_on: NaiveDate,
///     #[finder(foreign_key = "customer_id")]
///     pub customer: Option<Customer>,
///     #[finder(skip)]
///     pub rendered: Option<String>,
/// }
///
/// let invoices = Invoice::finder(&pool)
///     .total().greater_than(100.0)
///     .customer().name().equal_to("Acme")
///     .get_items()
///     .await?;
/// ```
///
/// # Generated Code
///
/// For the struct above:
///
/// - `impl Entity` and `impl FromSqlRow` for `Invoice`
/// - `Invoice::TOTAL: Column<f64>` (one constant per column) and
///   `Invoice::CUSTOMER: JoinSpec`
/// - `InvoiceFinder` with `id()`, `total()`, `issued_on()` returning field
///   clauses and `customer()` entering `Customer`'s scope
/// - `InvoiceScope<Outer>` for queries reaching `Invoice` through a join
/// - `impl Queryable for Invoice`
#[proc_macro_derive(Finder, attributes(finder))]
pub fn derive_finder(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let result = finder_codegen::extract(&input, "")
        .and_then(|metadata| finder_codegen::generate(&metadata));

    match result {
        Ok(artifact) => artifact.tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

/// Mark a struct for finder generation by `finder_codegen::GenerationDriver`.
///
/// The item is passed through unchanged apart from its `#[finder(...)]`
/// attributes, which the build script has already read. Marking anything but a
/// struct, or a struct with invalid finder attributes, is a compile error.
#[proc_macro_attribute]
pub fn entity(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        let args = proc_macro2::TokenStream::from(args);
        return syn::Error::new_spanned(args, "#[entity] takes no arguments")
            .to_compile_error()
            .into();
    }

    let item = parse_macro_input!(input as Item);

    let mut item = match item {
        Item::Struct(item) => item,
        other => {
            let (name, kind) = describe(&other);
            return GenerationError::NotAStruct { name, kind }
                .to_compile_error()
                .into();
        }
    };

    // Validate the declaration the build script will read
    if let Err(error) = finder_codegen::extract(&DeriveInput::from(item.clone()), "") {
        return error.to_compile_error().into();
    }

    // Without the derive nothing else claims the helper attributes
    if !derives_finder(&item.attrs) {
        item.attrs.retain(|attr| !finder_codegen::attrs::is_finder_attr(attr));
        for field in item.fields.iter_mut() {
            field
                .attrs
                .retain(|attr| !finder_codegen::attrs::is_finder_attr(attr));
        }
    }

    quote!(#item).into()
}

fn derives_finder(attrs: &[Attribute]) -> bool {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("derive"))
        .filter_map(|attr| {
            attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)
                .ok()
        })
        .flatten()
        .any(|path| path.segments.last().is_some_and(|segment| segment.ident == "Finder"))
}

fn describe(item: &Item) -> (String, &'static str) {
    match item {
        Item::Enum(item) => (item.ident.to_string(), "an enum"),
        Item::Union(item) => (item.ident.to_string(), "a union"),
        Item::Trait(item) => (item.ident.to_string(), "a trait"),
        Item::Fn(item) => (item.sig.ident.to_string(), "a function"),
        Item::Type(item) => (item.ident.to_string(), "a type alias"),
        Item::Const(item) => (item.ident.to_string(), "a constant"),
        Item::Static(item) => (item.ident.to_string(), "a static"),
        Item::Mod(item) => (item.ident.to_string(), "a module"),
        _ => ("item".to_string(), "not a struct"),
    }
}
