//! Finder source generation
//!
//! For one entity the generator emits:
//!
//! - `impl Entity` and `impl FromSqlRow`
//! - a typed constant per field: `Column<T>` for columns, `JoinSpec` for
//!   related entities
//! - `<Name>Finder`, the scope rooted at the entity, with one method per field
//! - `<Name>Scope<Outer>`, the scope used when the entity is reached through a
//!   join from another query; `end()` returns to the outer scope
//! - `impl Queryable`, tying the entity to both scopes
//!
//! Emission runs in stages and fails as a whole: no partial artifact is
//! returned.

use convert_case::{Case, Casing};
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{LitStr, Type};

use crate::error::{EmitStage, GenerationError};
use crate::metadata::{EntityMetadata, FieldKind, FieldMetadata, MemberRole, RelationLink};

/// Method names every generated scope already defines
const RESERVED_METHODS: &[&str] = &[
    "new",
    "end",
    "max_items",
    "distinct",
    "get_item",
    "get_items",
    "count",
    "finder_mut",
    "into_finder",
];

/// Generated source for one entity.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Qualified name of the entity
    pub entity: String,
    /// Suggested file name when written by a build script
    pub file_name: String,
    /// Methods returning a field clause, in field order
    pub entry_methods: Vec<String>,
    /// Methods entering a related entity's scope, in field order
    pub join_accessors: Vec<String>,
    pub tokens: TokenStream,
}

impl Artifact {
    /// Source text for writing to a file
    pub fn to_source(&self) -> String {
        format!(
            "// Generated finder for {}. Do not edit.\n{}\n",
            self.entity, self.tokens
        )
    }
}

/// Generate the finder artifact for an entity.
pub fn generate(metadata: &EntityMetadata) -> Result<Artifact, GenerationError> {
    let entity = metadata.qualified_name.as_str();

    // Namespace
    let namespace = if metadata.namespace.is_empty() {
        None
    } else {
        let path = syn::parse_str::<syn::Path>(&metadata.namespace).map_err(|e| {
            GenerationError::emit(
                entity,
                EmitStage::Namespace,
                format!("invalid module path `{}`: {}", metadata.namespace, e),
            )
        })?;
        Some(path)
    };

    // Imports
    let krate = syn::parse_str::<syn::Path>(&metadata.crate_path).map_err(|e| {
        GenerationError::emit(
            entity,
            EmitStage::Imports,
            format!("invalid runtime crate path `{}`: {}", metadata.crate_path, e),
        )
    })?;
    let imports = match &namespace {
        Some(path) => quote! {
            #[allow(unused_imports)]
            use #path::*;
        },
        None => TokenStream::new(),
    };

    // Open
    let primary_key = open(metadata)?;

    // Methods
    let methods = methods(metadata, &krate)?;

    // Close
    let tokens = close(metadata, &krate, imports, primary_key, &methods);
    syn::parse2::<syn::File>(tokens.clone()).map_err(|e| {
        GenerationError::emit(entity, EmitStage::Close, format!("generated code does not parse: {}", e))
    })?;

    tracing::debug!(
        entity,
        entry_methods = methods.entry_methods.len(),
        join_accessors = methods.join_accessors.len(),
        "Generated finder"
    );

    Ok(Artifact {
        entity: entity.to_string(),
        file_name: format!("{}_finder.rs", metadata.simple_name.to_case(Case::Snake)),
        entry_methods: methods.entry_methods,
        join_accessors: methods.join_accessors,
        tokens,
    })
}

/// Check the entity can have a finder and return its primary key column.
fn open(metadata: &EntityMetadata) -> Result<&str, GenerationError> {
    let fail = |reason: &str| GenerationError::emit(&metadata.qualified_name, EmitStage::Open, reason);

    if !metadata.is_persistable {
        return Err(fail("type is not persistable, add #[finder(table = \"...\")]"));
    }
    if !metadata.generics.params.is_empty() {
        return Err(fail("generic entities are not supported"));
    }
    if metadata.columns().next().is_none() {
        return Err(fail("entity has no persisted columns"));
    }

    let primary_key = metadata.primary_key.as_deref().ok_or_else(|| {
        fail("no primary key, mark a field with #[finder(primary_key)] or declare `id`")
    })?;
    if !metadata.columns().any(|field| field.column == primary_key) {
        return Err(fail("the primary key must be a column, not a related entity"));
    }

    Ok(primary_key)
}

#[derive(Default)]
struct Methods {
    constants: Vec<TokenStream>,
    root: Vec<TokenStream>,
    nested: Vec<TokenStream>,
    entry_methods: Vec<String>,
    join_accessors: Vec<String>,
}

fn methods(metadata: &EntityMetadata, krate: &syn::Path) -> Result<Methods, GenerationError> {
    let name = &metadata.ident;
    let mut methods = Methods::default();

    for field in &metadata.fields {
        check_field(metadata, field)?;

        let method = &field.ident;
        let constant = format_ident!("{}", field.name.to_uppercase());
        let value_ty = &field.value_ty;

        match &field.kind {
            FieldKind::Complex { target, link } => {
                let join = join_spec(krate, target, link, metadata, field);
                let doc = doc(&format!("Join to `{}` through `{}`", type_name(target), field.name));
                methods.constants.push(quote! {
                    #doc
                    pub const #constant: #krate::orm::JoinSpec = #join;
                });
                methods.root.push(quote! {
                    pub fn #method(self) -> <#target as #krate::orm::Queryable>::Scope<Self> {
                        <#target as #krate::orm::Queryable>::scope(
                            self,
                            ::std::vec![#name::#constant],
                        )
                    }
                });
                methods.nested.push(quote! {
                    pub fn #method(self) -> <#target as #krate::orm::Queryable>::Scope<Self> {
                        let mut chain = self.chain.clone();
                        chain.push(#name::#constant);
                        <#target as #krate::orm::Queryable>::scope(self, chain)
                    }
                });
                methods.join_accessors.push(field.name.clone());
            }
            _ => {
                let column = LitStr::new(&field.column, Span::call_site());
                let doc = doc(&format!("Column `{}`", field.column));
                methods.constants.push(quote! {
                    #doc
                    pub const #constant: #krate::orm::Column<#value_ty> =
                        #krate::orm::Column::new(#column);
                });
                methods.root.push(quote! {
                    pub fn #method(self) -> #krate::orm::FieldClause<Self, #value_ty> {
                        #krate::orm::FieldClause::new(self, #name::#constant)
                    }
                });
                methods.nested.push(quote! {
                    pub fn #method(self) -> #krate::orm::FieldClause<Self, #value_ty> {
                        let column = #name::#constant.through(&self.chain);
                        #krate::orm::FieldClause::new(self, column)
                    }
                });
                methods.entry_methods.push(field.name.clone());
            }
        }
    }

    Ok(methods)
}

fn check_field(metadata: &EntityMetadata, field: &FieldMetadata) -> Result<(), GenerationError> {
    if RESERVED_METHODS.contains(&field.name.as_str()) {
        return Err(GenerationError::emit(
            &metadata.qualified_name,
            EmitStage::Methods,
            format!(
                "field `{}` collides with a generated scope method, rename it or mark it #[finder(skip)]",
                field.name
            ),
        ));
    }
    if matches!(field.value_ty, Type::Reference(_)) {
        return Err(GenerationError::emit(
            &metadata.qualified_name,
            EmitStage::Methods,
            format!("field `{}` is borrowed and cannot be decoded from a row", field.name),
        ));
    }
    Ok(())
}

fn join_spec(
    krate: &syn::Path,
    target: &Type,
    link: &RelationLink,
    metadata: &EntityMetadata,
    field: &FieldMetadata,
) -> TokenStream {
    let related = quote!(<#target as #krate::orm::Entity>);
    match link {
        RelationLink::References { local_column } => {
            let local = LitStr::new(local_column, Span::call_site());
            quote! {
                #krate::orm::JoinSpec::new(
                    #related::ENTITY_NAME,
                    #related::TABLE_NAME,
                    #local,
                    #related::PRIMARY_KEY,
                )
            }
        }
        RelationLink::MappedBy { foreign_column } => {
            let local = LitStr::new(
                metadata.primary_key.as_deref().unwrap_or(&field.column),
                Span::call_site(),
            );
            let foreign = LitStr::new(foreign_column, Span::call_site());
            quote! {
                #krate::orm::JoinSpec::new(
                    #related::ENTITY_NAME,
                    #related::TABLE_NAME,
                    #local,
                    #foreign,
                )
            }
        }
    }
}

fn close(
    metadata: &EntityMetadata,
    krate: &syn::Path,
    imports: TokenStream,
    primary_key: &str,
    methods: &Methods,
) -> TokenStream {
    let name = &metadata.ident;
    let vis = &metadata.vis;
    let finder = format_ident!("{}Finder", name);
    let scope = format_ident!("{}Scope", name);

    let simple_name = LitStr::new(&metadata.simple_name, Span::call_site());
    let entity_name = if metadata.namespace.is_empty() {
        quote!(::core::concat!(::core::module_path!(), "::", #simple_name))
    } else {
        let qualified = LitStr::new(&metadata.qualified_name, Span::call_site());
        quote!(#qualified)
    };
    let table = LitStr::new(metadata.table.as_deref().unwrap_or_default(), Span::call_site());
    let primary_key = LitStr::new(primary_key, Span::call_site());
    let columns: Vec<LitStr> = metadata
        .columns()
        .map(|field| LitStr::new(&field.column, Span::call_site()))
        .collect();

    let decoders = metadata.members.iter().map(|member| {
        let ident = &member.ident;
        let ty = &member.ty;
        match &member.role {
            MemberRole::Column(column) => quote! {
                #ident: <#ty as #krate::orm::ColumnType>::decode(row, #column)?
            },
            MemberRole::Default => quote! {
                #ident: ::core::default::Default::default()
            },
            MemberRole::BaseRecord => quote! {
                #ident: <#ty as #krate::orm::FromSqlRow>::from_row(row)?
            },
        }
    });

    let constants = &methods.constants;
    let root = &methods.root;
    let nested = &methods.nested;

    let finder_doc = doc(&format!("Typed query over `{}`", metadata.simple_name));
    let scope_doc = doc(&format!(
        "Conditions on `{}` reached through joins from an outer query",
        metadata.simple_name
    ));

    quote! {
        #imports

        impl #krate::orm::Entity for #name {
            const ENTITY_NAME: &'static str = #entity_name;
            const TABLE_NAME: &'static str = #table;
            const PRIMARY_KEY: &'static str = #primary_key;

            fn column_names() -> &'static [&'static str] {
                &[#(#columns),*]
            }
        }

        impl #krate::orm::FromSqlRow for #name {
            fn from_row(
                row: &#krate::sqlx::sqlite::SqliteRow,
            ) -> ::core::result::Result<Self, #krate::sqlx::Error> {
                ::core::result::Result::Ok(Self {
                    #(#decoders,)*
                })
            }
        }

        #[allow(dead_code)]
        impl #name {
            #(#constants)*
        }

        #finder_doc
        #vis struct #finder {
            finder: #krate::orm::Finder<#name>,
        }

        #[allow(dead_code)]
        impl #finder {
            pub fn new(pool: &#krate::sqlx::sqlite::SqlitePool) -> Self {
                Self {
                    finder: #krate::orm::Finder::new(pool),
                }
            }

            #(#root)*
        }

        impl #krate::orm::FinderScope for #finder {
            type Root = #name;

            fn finder_mut(&mut self) -> &mut #krate::orm::Finder<#name> {
                &mut self.finder
            }

            fn into_finder(self) -> #krate::orm::Finder<#name> {
                self.finder
            }
        }

        #scope_doc
        #vis struct #scope<Outer> {
            outer: Outer,
            chain: ::std::vec::Vec<#krate::orm::JoinSpec>,
        }

        #[allow(dead_code)]
        impl<Outer: #krate::orm::FinderScope> #scope<Outer> {
            /// Return to the outer scope
            pub fn end(self) -> Outer {
                self.outer
            }

            #(#nested)*
        }

        impl<Outer: #krate::orm::FinderScope> #krate::orm::FinderScope for #scope<Outer> {
            type Root = Outer::Root;

            fn finder_mut(&mut self) -> &mut #krate::orm::Finder<Outer::Root> {
                self.outer.finder_mut()
            }

            fn into_finder(self) -> #krate::orm::Finder<Outer::Root> {
                self.outer.into_finder()
            }
        }

        impl #krate::orm::Queryable for #name {
            type Finder = #finder;
            type Scope<Outer: #krate::orm::FinderScope> = #scope<Outer>;

            fn finder(pool: &#krate::sqlx::sqlite::SqlitePool) -> #finder {
                #finder::new(pool)
            }

            fn scope<Outer: #krate::orm::FinderScope>(
                outer: Outer,
                chain: ::std::vec::Vec<#krate::orm::JoinSpec>,
            ) -> #scope<Outer> {
                #scope { outer, chain }
            }
        }
    }
}

fn doc(text: &str) -> TokenStream {
    let text = LitStr::new(text, Span::call_site());
    quote!(#[doc = #text])
}

fn type_name(ty: &Type) -> String {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .unwrap_or_default(),
        other => quote!(#other).to_string(),
    }
}
