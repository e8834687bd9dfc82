use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitInt, LitStr, parse_macro_input, spanned::Spanned};

/// Implements `recordmap::Record` for a struct with named fields.
///
/// ```ignore
/// #[derive(Default, Record)]
/// #[record(table = "users")]
/// struct User {
///     #[column(primary_key, auto_increment)]
///     id: i64,
///     #[column(name = "display_name", max_length = 50)]
///     name: String,
///     #[column]
///     #[nullable]
///     email: Option<String>,
///     // not mapped
///     session: Vec<u8>,
/// }
/// ```
///
/// Fields without a column or primary-key marker are skipped. Primary-key
/// validation happens when the metadata is built, not at compile time.
#[proc_macro_derive(
    Record,
    attributes(record, column, primary_key, nullable, auto_increment, max_length)
)]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct RecordOptions {
    table: Option<LitStr>,
}

#[derive(Default)]
struct ColumnOptions {
    column: bool,
    name: Option<LitStr>,
    primary_key: bool,
    nullable: bool,
    auto_increment: bool,
    max_length: Option<usize>,
}

impl ColumnOptions {
    /// Column or key marker present; only these fields get accessors.
    fn is_mapped(&self) -> bool {
        self.column || self.name.is_some() || self.primary_key
    }
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Record does not support generic structs",
        ));
    }

    let options = parse_record_options(&input.attrs)?;

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields,
            _ => {
                return Err(syn::Error::new(
                    struct_name.span(),
                    "Record requires named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record can only be derived for structs",
            ));
        }
    };

    let mut members = Vec::new();
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Record requires named fields"))?;
        let column = parse_column_options(&field.attrs)?;
        members.push(expand_member(&ident, &column));
    }

    let type_name = struct_name.to_string();
    let table = options.table.map(|table| quote!(.table(#table)));

    Ok(quote! {
        impl ::recordmap::Record for #struct_name {
            fn declaration() -> ::recordmap::schema::RecordDeclaration<Self> {
                ::recordmap::schema::RecordDeclaration::new(#type_name)
                    #table
                    #(.member(#members))*
            }
        }
    })
}

fn expand_member(ident: &Ident, options: &ColumnOptions) -> TokenStream2 {
    let member_name = ident.to_string();

    let mut annotations = Vec::new();
    if options.column || options.name.is_some() {
        let name = match &options.name {
            Some(name) => quote!(::core::option::Option::Some(::std::string::String::from(#name))),
            None => quote!(::core::option::Option::None),
        };
        annotations.push(quote!(::recordmap::schema::Annotation::Column(#name)));
    }
    if options.primary_key {
        annotations.push(quote!(::recordmap::schema::Annotation::PrimaryKey));
    }
    if options.nullable {
        annotations.push(quote!(::recordmap::schema::Annotation::Nullable));
    }
    if options.auto_increment {
        annotations.push(quote!(::recordmap::schema::Annotation::AutoIncrement));
    }
    if let Some(length) = options.max_length {
        let length = proc_macro2::Literal::usize_unsuffixed(length);
        annotations.push(quote!(::recordmap::schema::Annotation::MaxLength(#length)));
    }

    // Modifiers alone do not map a field, so its type need not be a ColumnValue
    if !options.is_mapped() {
        return quote! {
            ::recordmap::schema::MemberDeclaration::<Self>::new(#member_name)
            #(.annotate(#annotations))*
        };
    }

    quote! {
        ::recordmap::schema::MemberDeclaration::<Self>::field(
            #member_name,
            |record: &Self| ::recordmap::ColumnValue::to_value(&record.#ident),
            |record: &mut Self, value: ::recordmap::Value| {
                record.#ident = ::recordmap::ColumnValue::from_value(value)?;
                ::core::result::Result::Ok(())
            },
        )
        #(.annotate(#annotations))*
    }
}

fn parse_record_options(attrs: &[syn::Attribute]) -> syn::Result<RecordOptions> {
    let mut options = RecordOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value = meta.value()?;
                options.table = Some(value.parse()?);
                return Ok(());
            }

            Err(meta.error("Unsupported record attribute. Supported: table = \"...\""))
        })?;
    }

    Ok(options)
}

fn parse_column_options(attrs: &[syn::Attribute]) -> syn::Result<ColumnOptions> {
    let mut options = ColumnOptions::default();
    let mut seen_column = false;

    for attr in attrs {
        let path = attr.path();

        if path.is_ident("column") {
            if seen_column {
                return Err(syn::Error::new(
                    attr.span(),
                    "Duplicate #[column(...)] attribute on field",
                ));
            }
            seen_column = true;
            options.column = true;

            match &attr.meta {
                syn::Meta::Path(_) => {}
                syn::Meta::List(list) => {
                    list.parse_nested_meta(|meta| {
                        if meta.path.is_ident("name") {
                            let lit: LitStr = meta.value()?.parse()?;
                            if lit.value().is_empty() {
                                return Err(meta.error("column name cannot be empty"));
                            }
                            options.name = Some(lit);
                            return Ok(());
                        }
                        if meta.path.is_ident("primary_key") {
                            options.primary_key = true;
                            return Ok(());
                        }
                        if meta.path.is_ident("nullable") {
                            options.nullable = true;
                            return Ok(());
                        }
                        if meta.path.is_ident("auto_increment") {
                            options.auto_increment = true;
                            return Ok(());
                        }
                        if meta.path.is_ident("max_length") {
                            let lit: LitInt = meta.value()?.parse()?;
                            options.max_length = Some(lit.base10_parse()?);
                            return Ok(());
                        }

                        Err(meta.error(
                            "Unsupported #[column(...)] option. Supported: name = \"...\", primary_key, nullable, auto_increment, max_length = <usize>",
                        ))
                    })?;
                }
                syn::Meta::NameValue(_) => {
                    return Err(syn::Error::new(
                        attr.span(),
                        "Unsupported #[column = ...] syntax. Use #[column] or #[column(name = \"...\")]",
                    ));
                }
            }
            continue;
        }

        if path.is_ident("max_length") {
            let lit: LitInt = attr.parse_args()?;
            options.max_length = Some(lit.base10_parse()?);
            continue;
        }

        let flag = if path.is_ident("primary_key") {
            &mut options.primary_key
        } else if path.is_ident("nullable") {
            &mut options.nullable
        } else if path.is_ident("auto_increment") {
            &mut options.auto_increment
        } else {
            continue;
        };

        if !matches!(attr.meta, syn::Meta::Path(_)) {
            return Err(syn::Error::new(
                attr.span(),
                "Marker attributes take no arguments",
            ));
        }
        *flag = true;
    }

    Ok(options)
}
