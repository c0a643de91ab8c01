/// Implement `FromSql` and `ToSql` for a serde type stored in a `jsonb` column.
#[macro_export]
macro_rules! diesel_jsonb {
    ($type: ty) => {
        impl ::diesel::deserialize::FromSql<::diesel::sql_types::Jsonb, ::diesel::pg::Pg>
            for $type
        {
            fn from_sql(
                value: diesel::backend::RawValue<'_, diesel::pg::Pg>,
            ) -> ::diesel::deserialize::Result<Self> {
                let bytes = value.as_bytes();
                if bytes.first() != Some(&1) {
                    return Err("Unsupported JSONB encoding version".into());
                }

                ::serde_json::from_slice(&bytes[1..])
                    .map_err(|e| format!("Invalid JSON: {}", e).into())
            }
        }

        impl ::diesel::serialize::ToSql<::diesel::sql_types::Jsonb, ::diesel::pg::Pg> for $type {
            fn to_sql(
                &self,
                out: &mut ::diesel::serialize::Output<diesel::pg::Pg>,
            ) -> ::diesel::serialize::Result {
                use std::io::Write;

                out.write_all(&[1])?;
                serde_json::to_writer(out, self)
                    .map(|_| diesel::serialize::IsNull::No)
                    .map_err(Into::into)
            }
        }
    };
}
