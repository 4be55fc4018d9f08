use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Table-level metadata from `#[entity(...)]`.
struct EntityAttr {
    table: Option<String>,
    unique_groups: Vec<Vec<String>>,
}

/// Column flags from `#[column(...)]`.
#[derive(Default)]
struct ColumnAttr {
    primary_key: bool,
    auto_increment: bool,
    skip: bool,
}

/// Parse `#[entity(table = "...", unique(a, b), ...)]`. Returns `None` when
/// the type carries no entity attribute.
fn parse_entity_attr(input: &DeriveInput) -> syn::Result<Option<EntityAttr>> {
    let mut parsed = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        let entity = parsed.get_or_insert_with(|| EntityAttr {
            table: None,
            unique_groups: Vec::new(),
        });
        // A bare `#[entity]` only marks the type.
        if matches!(attr.meta, syn::Meta::Path(_)) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                entity.table = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("unique") {
                let mut group = Vec::new();
                meta.parse_nested_meta(|column| {
                    let ident = column
                        .path
                        .get_ident()
                        .ok_or_else(|| column.error("expected a field name"))?;
                    group.push(field_name(ident));
                    Ok(())
                })?;
                if group.is_empty() {
                    return Err(meta.error("unique group must name at least one field"));
                }
                entity.unique_groups.push(group);
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `table` or `unique`"))
            }
        })?;
    }
    Ok(parsed)
}

fn parse_column_attr(field: &syn::Field) -> syn::Result<ColumnAttr> {
    let mut column = ColumnAttr::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                column.primary_key = true;
            } else if meta.path.is_ident("auto_increment") {
                column.auto_increment = true;
            } else if meta.path.is_ident("skip") {
                column.skip = true;
            } else {
                return Err(meta.error(
                    "unsupported column attribute, expected `primary_key`, `auto_increment` or `skip`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(column)
}

/// Field name as serde sees it (raw identifiers lose their `r#`).
fn field_name(ident: &syn::Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
}

/// Type name with whitespace removed, e.g. `Option<i64>`.
fn type_name(ty: &syn::Type) -> String {
    quote!(#ty).to_string().replace(' ', "")
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Entity only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Entity only supports structs",
            ));
        }
    };

    let entity_setup = match parse_entity_attr(input)? {
        None => quote! {},
        Some(entity) => {
            let table = match entity.table {
                Some(table) => quote! { ::core::option::Option::Some(#table) },
                None => quote! { ::core::option::Option::None },
            };
            let groups = entity.unique_groups.iter().map(|group| {
                quote! { .unique([#(#group),*]) }
            });
            quote! { .entity(#table) #(#groups)* }
        }
    };

    let mut field_decls = Vec::new();
    for field in fields {
        let column = parse_column_attr(field)?;
        if column.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_str = field_name(ident);
        let type_str = type_name(&field.ty);
        let primary_key = column.primary_key;
        let auto_increment = column.auto_increment;
        field_decls.push(quote! {
            .field(
                entity_storage::FieldDeclaration::new(#field_str, #type_str)
                    .primary_key(#primary_key)
                    .auto_increment(#auto_increment)
            )
        });
    }

    Ok(quote! {
        impl #impl_generics entity_storage::Entity for #name #ty_generics #where_clause {
            fn entity_name() -> &'static str {
                #name_str
            }

            fn declaration() -> entity_storage::RecordDeclaration {
                entity_storage::RecordDeclaration::new(#name_str)
                    #entity_setup
                    #(#field_decls)*
            }
        }
    })
}

/// Derive macro for the `Entity` trait.
///
/// Reads table metadata from `#[entity(...)]` and column flags from
/// `#[column(...)]`, and generates `entity_name()` and `declaration()`.
/// Validation (supported kinds, key rules, unique groups) happens when the
/// declaration is built into a descriptor, not at expansion time.
///
/// ## Attributes
///
/// - `#[entity]` / `#[entity(table = "...")]` - mark the type as an entity;
///   the table defaults to the lower-cased type name
/// - `#[entity(unique(a, b))]` - a UNIQUE constraint; repeat for more groups
/// - `#[column(primary_key)]`, `#[column(auto_increment)]` - key flags
/// - `#[column(skip)]` - leave the field out of the table
///
/// ## Example
///
/// ```text
/// #[derive(Entity, Serialize, Deserialize)]
/// #[entity(table = "user", unique(name))]
/// struct User {
///     #[column(primary_key, auto_increment)]
///     pub id: i64,
///     pub name: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
