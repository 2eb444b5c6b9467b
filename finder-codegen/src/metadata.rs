//! Entity metadata extraction
//!
//! Turns a struct declaration into [`EntityMetadata`]: which fields are
//! persisted, how each one is classified, and how related entities are joined.
//! Extraction is pure; it reads the declaration and nothing else.

use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::{
    Data, DeriveInput, Fields, GenericArgument, Generics, Ident, PathArguments, Type, TypePath,
    Visibility,
};

use crate::attrs::{self, FieldAttrs};
use crate::error::GenerationError;

/// Default path of the runtime crate in generated code
pub const DEFAULT_CRATE_PATH: &str = "::finder";

const SCALAR_TYPES: &[&str] = &[
    "i8", "i16", "i32", "i64", "u8", "u16", "u32", "f32", "f64", "bool", "char",
];

/// Integer types SQLite cannot store losslessly
const UNSUPPORTED_SCALARS: &[&str] = &["i128", "isize", "u64", "u128", "usize"];

const TEXTUAL_TYPES: &[&str] = &["String", "str"];

const TEMPORAL_TYPES: &[&str] = &["NaiveDate", "NaiveTime", "NaiveDateTime", "DateTime"];

const COLLECTION_TYPES: &[&str] = &["Vec", "VecDeque", "HashSet", "BTreeSet", "HashMap", "BTreeMap"];

/// Type name of the embedded base record
pub const BASE_RECORD_TYPE: &str = "Model";

// ============================================================================
// Metadata types
// ============================================================================

/// How a related entity is joined to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationLink {
    /// The parent row holds the join column (`parent.local_column = related.pk`)
    References { local_column: String },
    /// The related row holds the join column (`related.foreign_column = parent.pk`)
    MappedBy { foreign_column: String },
}

/// Classification of a persisted field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Integers, floats, `bool`, `char`
    Scalar,
    /// `String`, `str`
    Textual,
    /// chrono dates and times
    Temporal,
    /// Standard collections, stored as JSON
    Collection,
    /// Another entity, reached through a join
    Complex { target: Type, link: RelationLink },
}

impl FieldKind {
    pub fn is_complex(&self) -> bool {
        matches!(self, FieldKind::Complex { .. })
    }
}

#[derive(Debug, Clone)]
pub struct FieldMetadata {
    /// Field name (also the generated method name)
    pub name: String,
    pub ident: Ident,
    /// Column name; for complex fields, the name the field would have as a column
    pub column: String,
    pub kind: FieldKind,
    /// Field type with `Option` and `Box` removed
    pub value_ty: Type,
    /// Declared as `Option<_>`
    pub nullable: bool,
    /// Merged in from the base record
    pub inherited: bool,
}

/// Role of a declared struct member when a row is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRole {
    /// Decoded from the named column
    Column(String),
    /// Left at `Default::default()` (skipped and related-entity fields)
    Default,
    /// Decoded as the embedded base record
    BaseRecord,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub ident: Ident,
    pub ty: Type,
    pub role: MemberRole,
}

/// Everything the generator needs to know about one entity type.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    pub ident: Ident,
    pub vis: Visibility,
    pub generics: Generics,
    pub simple_name: String,
    /// Module path the type lives in, empty when unknown (derive macros)
    pub namespace: String,
    pub qualified_name: String,
    pub is_persistable: bool,
    pub extends_base_record: bool,
    pub table: Option<String>,
    pub crate_path: String,
    pub primary_key: Option<String>,
    /// Persisted fields in declaration order, base record fields last
    pub fields: Vec<FieldMetadata>,
    /// Declared struct members, for row decoding
    pub members: Vec<Member>,
}

impl EntityMetadata {
    /// Column-backed fields (everything but related entities)
    pub fn columns(&self) -> impl Iterator<Item = &FieldMetadata> {
        self.fields.iter().filter(|field| !field.kind.is_complex())
    }

    /// Related-entity fields
    pub fn relations(&self) -> impl Iterator<Item = &FieldMetadata> {
        self.fields.iter().filter(|field| field.kind.is_complex())
    }

    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|field| field.name == name)
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract metadata from a type declaration.
///
/// `namespace` is the module path the type lives in (`""` when unknown).
/// Types without a `#[finder(table = "...")]` attribute are not persistable
/// and come back with no fields.
pub fn extract(input: &DeriveInput, namespace: &str) -> Result<EntityMetadata, GenerationError> {
    let simple_name = input.ident.unraw().to_string();
    let namespace = namespace.trim_matches(':').to_string();
    let qualified_name = if namespace.is_empty() {
        simple_name.clone()
    } else {
        format!("{}::{}", namespace, simple_name)
    };

    let data = match &input.data {
        Data::Struct(data) => data,
        Data::Enum(_) => {
            return Err(GenerationError::NotAStruct {
                name: qualified_name,
                kind: "an enum",
            });
        }
        Data::Union(_) => {
            return Err(GenerationError::NotAStruct {
                name: qualified_name,
                kind: "a union",
            });
        }
    };

    let container = attrs::parse_container(&input.attrs)?;
    let crate_path = container
        .crate_path
        .clone()
        .unwrap_or_else(|| DEFAULT_CRATE_PATH.to_string());

    let mut metadata = EntityMetadata {
        ident: input.ident.clone(),
        vis: input.vis.clone(),
        generics: input.generics.clone(),
        simple_name,
        namespace,
        qualified_name,
        is_persistable: container.table.is_some(),
        extends_base_record: false,
        table: container.table,
        crate_path,
        primary_key: None,
        fields: Vec::new(),
        members: Vec::new(),
    };

    if !metadata.is_persistable {
        tracing::debug!(entity = %metadata.qualified_name, "Type is not persistable, no fields extracted");
        return Ok(metadata);
    }

    let named = match &data.fields {
        Fields::Named(named) => named,
        // Tuple and unit structs have no named columns
        Fields::Unnamed(_) | Fields::Unit => return Ok(metadata),
    };

    let mut primary_key = None;

    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let name = ident.unraw().to_string();
        let field_attrs = attrs::parse_field(&field.attrs)?;

        if field_attrs.skip || is_phantom(&field.ty) {
            metadata.members.push(Member {
                ident,
                ty: field.ty.clone(),
                role: MemberRole::Default,
            });
            continue;
        }

        if field_attrs.base || last_segment_name(&field.ty).as_deref() == Some(BASE_RECORD_TYPE) {
            metadata.extends_base_record = true;
            metadata.members.push(Member {
                ident,
                ty: field.ty.clone(),
                role: MemberRole::BaseRecord,
            });
            continue;
        }

        let column = field_attrs.column.clone().unwrap_or_else(|| name.clone());
        let classified = classify(&metadata.qualified_name, &name, &field.ty, &field_attrs)?;

        if field_attrs.primary_key {
            primary_key = Some(column.clone());
        }

        let role = if classified.kind.is_complex() {
            MemberRole::Default
        } else {
            MemberRole::Column(column.clone())
        };

        metadata.members.push(Member {
            ident: ident.clone(),
            ty: field.ty.clone(),
            role,
        });
        metadata.fields.push(FieldMetadata {
            name,
            ident,
            column,
            kind: classified.kind,
            value_ty: classified.value_ty,
            nullable: classified.nullable,
            inherited: false,
        });
    }

    if metadata.extends_base_record {
        merge_base_record(&mut metadata)?;
    }

    metadata.primary_key = primary_key.or_else(|| {
        if metadata.columns().any(|field| field.column == "id") {
            Some("id".to_string())
        } else if metadata.extends_base_record {
            Some("guid".to_string())
        } else {
            None
        }
    });

    tracing::debug!(
        entity = %metadata.qualified_name,
        table = ?metadata.table,
        fields = metadata.fields.len(),
        base_record = metadata.extends_base_record,
        "Extracted entity metadata"
    );

    Ok(metadata)
}

struct Classified {
    kind: FieldKind,
    value_ty: Type,
    nullable: bool,
}

fn classify(
    entity: &str,
    field: &str,
    ty: &Type,
    field_attrs: &FieldAttrs,
) -> Result<Classified, GenerationError> {
    let unresolved = |reason: String| GenerationError::UnresolvedType {
        entity: entity.to_string(),
        field: field.to_string(),
        reason,
    };

    let (value_ty, nullable) = match generic_argument(ty, "Option") {
        Some(inner) => (inner, true),
        None => (ty.clone(), false),
    };
    let (value_ty, boxed) = match generic_argument(&value_ty, "Box") {
        Some(inner) => (inner, true),
        None => (value_ty, false),
    };

    let type_name = match &value_ty {
        Type::Path(path) if path.qself.is_none() => last_segment(path)
            .map(|segment| segment.ident.to_string())
            .ok_or_else(|| unresolved("empty type path".to_string()))?,
        Type::Reference(reference) if is_str(&reference.elem) => "str".to_string(),
        Type::Group(group) => {
            return classify(entity, field, &group.elem, field_attrs);
        }
        other => return Err(unresolved(format!("`{}` is not a nameable type", describe(other)))),
    };

    if UNSUPPORTED_SCALARS.contains(&type_name.as_str()) {
        return Err(unresolved(format!("{} has no lossless SQLite column type", type_name)));
    }

    if let Some(foreign_column) = &field_attrs.mapped_by {
        // One-to-many: the related type is the collection's element
        let target = generic_argument(&value_ty, &type_name)
            .filter(|_| COLLECTION_TYPES.contains(&type_name.as_str()))
            .unwrap_or_else(|| value_ty.clone());
        return Ok(Classified {
            kind: FieldKind::Complex {
                target,
                link: RelationLink::MappedBy {
                    foreign_column: foreign_column.clone(),
                },
            },
            value_ty,
            nullable,
        });
    }

    let kind = if SCALAR_TYPES.contains(&type_name.as_str()) {
        FieldKind::Scalar
    } else if TEXTUAL_TYPES.contains(&type_name.as_str()) {
        FieldKind::Textual
    } else if TEMPORAL_TYPES.contains(&type_name.as_str()) {
        FieldKind::Temporal
    } else if COLLECTION_TYPES.contains(&type_name.as_str()) {
        FieldKind::Collection
    } else {
        let local_column = field_attrs
            .foreign_key
            .clone()
            .unwrap_or_else(|| format!("{}_id", field));
        FieldKind::Complex {
            target: value_ty.clone(),
            link: RelationLink::References { local_column },
        }
    };

    if boxed && !kind.is_complex() {
        return Err(unresolved("only related entities may be boxed".to_string()));
    }

    Ok(Classified {
        kind,
        value_ty,
        nullable,
    })
}

/// Append the base record's fields the entity does not declare itself.
fn merge_base_record(metadata: &mut EntityMetadata) -> Result<(), GenerationError> {
    let text: Type = syn::parse_str("::std::string::String")?;
    let timestamp: Type = syn::parse_str(&format!("{}::chrono::NaiveDateTime", metadata.crate_path))?;

    let base_fields = [
        ("guid", FieldKind::Textual, &text, false),
        ("created_by", FieldKind::Textual, &text, true),
        ("updated_by", FieldKind::Textual, &text, true),
        ("created_on", FieldKind::Temporal, &timestamp, true),
        ("updated_on", FieldKind::Temporal, &timestamp, true),
    ];

    for (name, kind, ty, nullable) in base_fields {
        let declared = metadata
            .fields
            .iter()
            .find(|field| field.name == name || field.column == name);
        if let Some(field) = declared {
            // The embedded record always reads its own fixed columns
            if field.name == name && field.column != name {
                return Err(syn::Error::new(
                    field.ident.span(),
                    format!(
                        "field `{}` maps to column `{}`, but the base record reads column `{}`",
                        name, field.column, name
                    ),
                )
                .into());
            }
            continue;
        }

        metadata.fields.push(FieldMetadata {
            name: name.to_string(),
            ident: Ident::new(name, Span::call_site()),
            column: name.to_string(),
            kind,
            value_ty: ty.clone(),
            nullable,
            inherited: true,
        });
    }

    Ok(())
}

// ============================================================================
// Type helpers
// ============================================================================

fn last_segment(path: &TypePath) -> Option<&syn::PathSegment> {
    path.path.segments.last()
}

/// The last path segment's identifier, e.g. `NaiveDate` for `chrono::NaiveDate`
fn last_segment_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) if path.qself.is_none() => {
            last_segment(path).map(|segment| segment.ident.to_string())
        }
        _ => None,
    }
}

/// `Some(T)` if `ty` is `wrapper<T, ..>` (matched on the last path segment)
fn generic_argument(ty: &Type, wrapper: &str) -> Option<Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = last_segment(path)?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner.clone()),
        _ => None,
    })
}

fn is_phantom(ty: &Type) -> bool {
    last_segment_name(ty).as_deref() == Some("PhantomData")
}

fn is_str(ty: &Type) -> bool {
    last_segment_name(ty).as_deref() == Some("str")
}

fn describe(ty: &Type) -> String {
    quote::ToTokens::to_token_stream(ty).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use syn::parse_quote;

    fn kinds(metadata: &EntityMetadata) -> Vec<(String, &FieldKind)> {
        metadata
            .fields
            .iter()
            .map(|field| (field.name.clone(), &field.kind))
            .collect()
    }

    #[test]
    fn test_classifies_fields() {
        let input: DeriveInput = parse_quote! {
            #[finder(table = "invoices")]
            pub struct Invoice {
                pub id: i64,
                pub number: String,
                pub total: f64,
                pub issued_on: chrono::NaiveDate,
                pub paid_at: Option<DateTime<Utc>>,
                pub tags: Vec<String>,
                pub customer: Option<Customer>,
            }
        };

        let metadata = extract(&input, "shop::billing").unwrap();

        assert_eq!(metadata.qualified_name, "shop::billing::Invoice");
        assert_eq!(metadata.table.as_deref(), Some("invoices"));
        assert_eq!(metadata.primary_key.as_deref(), Some("id"));

        let kinds = kinds(&metadata);
        assert_matches!(kinds[0], (ref n, FieldKind::Scalar) if n == "id");
        assert_matches!(kinds[1], (_, FieldKind::Textual));
        assert_matches!(kinds[2], (_, FieldKind::Scalar));
        assert_matches!(kinds[3], (_, FieldKind::Temporal));
        assert_matches!(kinds[4], (_, FieldKind::Temporal));
        assert_matches!(kinds[5], (_, FieldKind::Collection));
        assert_matches!(
            kinds[6],
            (_, FieldKind::Complex { link: RelationLink::References { local_column }, .. })
                if local_column == "customer_id"
        );

        let paid_at = metadata.field("paid_at").unwrap();
        assert!(paid_at.nullable);
        assert_eq!(describe(&paid_at.value_ty), "DateTime < Utc >");
    }

    #[test]
    fn test_skipped_and_marker_fields_are_excluded() {
        let input: DeriveInput = parse_quote! {
            #[finder(table = "notes")]
            struct Note {
                id: i64,
                #[finder(skip)]
                cached_html: String,
                _marker: std::marker::PhantomData<()>,
            }
        };

        let metadata = extract(&input, "").unwrap();

        assert_eq!(metadata.fields.len(), 1);
        assert!(metadata.field("cached_html").is_none());
        assert_eq!(metadata.members.len(), 3);
        assert_eq!(metadata.members[1].role, MemberRole::Default);
        assert_eq!(metadata.members[2].role, MemberRole::Default);
    }

    #[test]
    fn test_one_to_many_is_complex() {
        let input: DeriveInput = parse_quote! {
            #[finder(table = "customers")]
            struct Customer {
                id: i64,
                #[finder(mapped_by = "customer_id")]
                invoices: Vec<Invoice>,
                nicknames: Vec<String>,
            }
        };

        let metadata = extract(&input, "").unwrap();

        let invoices = metadata.field("invoices").unwrap();
        assert_matches!(
            &invoices.kind,
            FieldKind::Complex { target, link: RelationLink::MappedBy { foreign_column } }
                if describe(target) == "Invoice" && foreign_column == "customer_id"
        );
        assert_matches!(metadata.field("nicknames").unwrap().kind, FieldKind::Collection);
        assert_eq!(metadata.members[1].role, MemberRole::Default);
    }

    #[test]
    fn test_attribute_overrides() {
        let input: DeriveInput = parse_quote! {
            #[finder(table = "orders", crate = "crate::db")]
            struct Order {
                #[finder(primary_key, column = "order_no")]
                number: String,
                #[finder(foreign_key = "buyer")]
                customer: Customer,
            }
        };

        let metadata = extract(&input, "").unwrap();

        assert_eq!(metadata.crate_path, "crate::db");
        assert_eq!(metadata.primary_key.as_deref(), Some("order_no"));
        assert_eq!(metadata.members[0].role, MemberRole::Column("order_no".to_string()));
        assert_matches!(
            &metadata.field("customer").unwrap().kind,
            FieldKind::Complex { link: RelationLink::References { local_column }, .. }
                if local_column == "buyer"
        );
    }

    #[test]
    fn test_base_record_merge() {
        let input: DeriveInput = parse_quote! {
            #[finder(table = "documents")]
            struct Document {
                title: String,
                created_by: Option<String>,
                #[finder(base)]
                record: Model,
            }
        };

        let metadata = extract(&input, "").unwrap();

        assert!(metadata.extends_base_record);
        assert_eq!(metadata.primary_key.as_deref(), Some("guid"));

        let names: Vec<&str> = metadata.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["title", "created_by", "guid", "updated_by", "created_on", "updated_on"]
        );
        assert!(!metadata.field("created_by").unwrap().inherited);
        assert!(metadata.field("updated_on").unwrap().inherited);
        assert_eq!(metadata.members[2].role, MemberRole::BaseRecord);
    }

    #[test]
    fn test_base_record_field_cannot_move_column() {
        let input: DeriveInput = parse_quote! {
            #[finder(table = "notes")]
            struct Note {
                #[finder(column = "uuid", primary_key)]
                guid: String,
                body: String,
                record: Model,
            }
        };

        let result = extract(&input, "");

        assert_matches!(
            result,
            Err(GenerationError::Attribute(error)) if error.to_string().contains("base record reads column `guid`")
        );
    }

    #[test]
    fn test_not_persistable_has_no_fields() {
        let input: DeriveInput = parse_quote! {
            struct Draft {
                id: i64,
                body: String,
            }
        };

        let metadata = extract(&input, "drafts").unwrap();

        assert!(!metadata.is_persistable);
        assert!(metadata.fields.is_empty());
    }

    #[test]
    fn test_unresolvable_types() {
        let input: DeriveInput = parse_quote! {
            #[finder(table = "points")]
            struct Point {
                id: i64,
                coords: (f64, f64),
            }
        };
        assert_matches!(
            extract(&input, ""),
            Err(GenerationError::UnresolvedType { field, .. }) if field == "coords"
        );

        let input: DeriveInput = parse_quote! {
            #[finder(table = "counters")]
            struct Counter {
                id: i64,
                hits: u64,
            }
        };
        assert_matches!(extract(&input, ""), Err(GenerationError::UnresolvedType { .. }));
    }

    #[test]
    fn test_rejects_non_structs() {
        let input: DeriveInput = parse_quote! {
            enum Status { Open, Closed }
        };
        assert_matches!(
            extract(&input, "shop"),
            Err(GenerationError::NotAStruct { name, kind: "an enum" }) if name == "shop::Status"
        );
    }
}
