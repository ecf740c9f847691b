use crate::{
    Item,
    attribute::{Attribute, value::Value},
    common::{Placeholders, path::Path},
    error::{Error, Result},
    record::{Record, RecordState},
    schema::Schema,
    transport::{Request, Response, Transport},
    write,
};

use aws_sdk_dynamodb::types;

/// SET operation for updating attributes.
///
/// ```rust
/// use dynamodb_mapper::write::update_item;
///
/// let assign = update_item::SetInput::Assign("value".into());
/// let increment = update_item::SetInput::Increment(10.into());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum SetInput {
    /// Assign a new value to the attribute. Assigning null or an empty set removes it.
    Assign(Value),
    /// Increment a numeric attribute by the specified value.
    Increment(Value),
    /// Decrement a numeric attribute by the specified value.
    Decrement(Value),
    /// Append values to the end of a list attribute.
    ListAppend(Value),
    /// Prepend values to the beginning of a list attribute.
    ListPrepend(Value),
    /// Assign a value only if the attribute doesn't exist.
    IfNotExists(Value),
}

impl SetInput {
    fn value(&self) -> &Value {
        match self {
            Self::Assign(value)
            | Self::Increment(value)
            | Self::Decrement(value)
            | Self::ListAppend(value)
            | Self::ListPrepend(value)
            | Self::IfNotExists(value) => value,
        }
    }

    fn get_set_expression(&self, path: &str, value_placeholder: &str) -> String {
        match self {
            Self::Assign(_) => format!("{path} = {value_placeholder}"),
            Self::Increment(_) => format!("{path} = {path} + {value_placeholder}"),
            Self::Decrement(_) => format!("{path} = {path} - {value_placeholder}"),
            Self::ListAppend(_) => format!("{path} = list_append({path}, {value_placeholder})"),
            Self::ListPrepend(_) => format!("{path} = list_append({value_placeholder}, {path})"),
            Self::IfNotExists(_) => format!("{path} = if_not_exists({path}, {value_placeholder})"),
        }
    }
}

/// Single action of an update expression.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateAction {
    /// `SET path = ...`
    Set(Path, SetInput),
    /// `ADD path value`, for numbers and sets.
    Add(Path, Value),
    /// `REMOVE path`
    Remove(Path),
    /// `DELETE path value`, removing elements from a set.
    Delete(Path, Value),
}

impl Path {
    /// `SET path = value`
    pub fn set(self, value: impl Into<Value>) -> UpdateAction {
        UpdateAction::Set(self, SetInput::Assign(value.into()))
    }

    /// `SET path = path + value`
    pub fn increment(self, value: impl Into<Value>) -> UpdateAction {
        UpdateAction::Set(self, SetInput::Increment(value.into()))
    }

    /// `SET path = path - value`
    pub fn decrement(self, value: impl Into<Value>) -> UpdateAction {
        UpdateAction::Set(self, SetInput::Decrement(value.into()))
    }

    /// `SET path = list_append(path, values)`
    pub fn append(self, values: impl Into<Value>) -> UpdateAction {
        UpdateAction::Set(self, SetInput::ListAppend(values.into()))
    }

    /// `SET path = list_append(values, path)`
    pub fn prepend(self, values: impl Into<Value>) -> UpdateAction {
        UpdateAction::Set(self, SetInput::ListPrepend(values.into()))
    }

    /// `SET path = if_not_exists(path, value)`
    pub fn set_if_not_exists(self, value: impl Into<Value>) -> UpdateAction {
        UpdateAction::Set(self, SetInput::IfNotExists(value.into()))
    }

    /// `ADD path value`
    pub fn add_value(self, value: impl Into<Value>) -> UpdateAction {
        UpdateAction::Add(self, value.into())
    }

    /// `REMOVE path`
    pub fn remove(self) -> UpdateAction {
        UpdateAction::Remove(self)
    }

    /// `DELETE path elements`
    pub fn delete_elements(self, elements: impl Into<Value>) -> UpdateAction {
        UpdateAction::Delete(self, elements.into())
    }
}

fn marshal(descriptor: Option<&Attribute>, value: &Value) -> Result<Option<types::AttributeValue>> {
    match descriptor {
        Some(attribute) => attribute.serialize(value),
        None if value.is_null() => Ok(None),
        None => Ok(Some(value.clone().into_wire())),
    }
}

/// Compile update actions into an update expression.
///
/// Clauses are grouped into `SET`, `REMOVE`, `ADD` and `DELETE` sections, in that order,
/// each keeping the order in which its actions were given.
pub(crate) fn compile_actions(
    actions: &[UpdateAction],
    schema: &Schema,
    placeholders: &mut Placeholders,
) -> Result<String> {
    let mut set_clauses = Vec::new();
    let mut remove_clauses = Vec::new();
    let mut add_clauses = Vec::new();
    let mut delete_clauses = Vec::new();
    for action in actions {
        match action {
            UpdateAction::Set(path, input) => {
                let descriptor = schema.descriptor_for(path);
                let wire = marshal(descriptor, input.value())?;
                let compiled_path = path.compile(placeholders);
                match (input, wire) {
                    (SetInput::Assign(_), None) => remove_clauses.push(compiled_path),
                    (_, None) => {
                        return Err(Error::Validation(format!(
                            "update of {path} needs a non-null value"
                        )));
                    }
                    (input, Some(wire)) => {
                        if matches!(input, SetInput::Increment(_) | SetInput::Decrement(_))
                            && !matches!(wire, types::AttributeValue::N(_))
                        {
                            return Err(Error::Validation(format!(
                                "arithmetic update of {path} needs a number"
                            )));
                        }
                        let value_placeholder = placeholders.value(wire);
                        set_clauses.push(input.get_set_expression(&compiled_path, &value_placeholder));
                    }
                }
            }
            UpdateAction::Add(path, value) => {
                let wire = marshal(schema.descriptor_for(path), value)?;
                match wire {
                    Some(
                        wire @ (types::AttributeValue::N(_)
                        | types::AttributeValue::Ss(_)
                        | types::AttributeValue::Ns(_)
                        | types::AttributeValue::Bs(_)),
                    ) => {
                        let compiled_path = path.compile(placeholders);
                        let value_placeholder = placeholders.value(wire);
                        add_clauses.push(format!("{compiled_path} {value_placeholder}"));
                    }
                    _ => {
                        return Err(Error::Validation(format!(
                            "ADD on {path} needs a number or a non-empty set"
                        )));
                    }
                }
            }
            UpdateAction::Remove(path) => remove_clauses.push(path.compile(placeholders)),
            UpdateAction::Delete(path, value) => {
                let wire = marshal(schema.descriptor_for(path), value)?;
                match wire {
                    Some(
                        wire @ (types::AttributeValue::Ss(_)
                        | types::AttributeValue::Ns(_)
                        | types::AttributeValue::Bs(_)),
                    ) => {
                        let compiled_path = path.compile(placeholders);
                        let value_placeholder = placeholders.value(wire);
                        delete_clauses.push(format!("{compiled_path} {value_placeholder}"));
                    }
                    _ => {
                        return Err(Error::Validation(format!(
                            "DELETE on {path} needs a non-empty set"
                        )));
                    }
                }
            }
        }
    }
    let sections: Vec<_> = [
        ("SET", set_clauses),
        ("REMOVE", remove_clauses),
        ("ADD", add_clauses),
        ("DELETE", delete_clauses),
    ]
    .into_iter()
    .filter(|(_, clauses)| !clauses.is_empty())
    .map(|(keyword, clauses)| format!("{keyword} {}", clauses.join(", ")))
    .collect();
    if sections.is_empty() {
        return Err(Error::Validation(
            "update needs at least one action".to_string(),
        ));
    }
    Ok(sections.join(" "))
}

/// Processed update item request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateItemInput {
    /// Primary key of the updated item.
    pub keys: Item,
    /// Compiled update expression.
    pub update_expression: String,
    /// Condition, placeholder tables and return options.
    pub write_operation: write::common::WriteInput,
}

/// Update item operation.
///
/// Updates the stored item in place and refreshes the record from the returned attributes.
/// For versioned schemas the version is bumped with the update and checked by the condition.
///
/// ```rust,no_run
/// use dynamodb_mapper::{common::path::Path, record::Record, transport::Transport, write};
///
/// # async fn example(transport: &dyn Transport, record: &mut Record) -> dynamodb_mapper::error::Result<()> {
/// let update_item = write::update_item::UpdateItem {
///     record,
///     actions: vec![Path::new("balance").increment(10)],
///     write_args: Default::default(),
/// };
/// update_item.send(transport).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UpdateItem<'r> {
    /// The record to update. Only its key and version are read.
    pub record: &'r mut Record,
    /// The changes to apply.
    pub actions: Vec<UpdateAction>,
    /// Additional write operation arguments (condition, return values, etc.).
    pub write_args: write::common::WriteArgs,
}

impl TryFrom<&UpdateItem<'_>> for UpdateItemInput {
    type Error = Error;

    fn try_from(update_item: &UpdateItem<'_>) -> Result<Self> {
        if update_item.actions.is_empty() {
            return Err(Error::Validation(
                "update needs at least one action".to_string(),
            ));
        }
        let record = &*update_item.record;
        let schema = record.schema();
        let keys = record.keys()?;
        let version = write::common::VersionCheck::of(record);
        let mut actions = update_item.actions.clone();
        if let Some(version) = &version {
            if actions.iter().any(|action| action_root(action) == version.attribute()) {
                return Err(Error::Validation(format!(
                    "version attribute {} is managed by the mapper",
                    version.attribute()
                )));
            }
            actions.push(version.action());
        }
        let condition = write::common::merge_conditions(&update_item.write_args, version.as_ref());
        let mut placeholders = Placeholders::default();
        let condition_expression = condition
            .map(|condition| condition.compile(Some(schema), &mut placeholders))
            .transpose()?;
        let update_expression = compile_actions(&actions, schema, &mut placeholders)?;
        let mut write_operation = write::common::WriteInput::new(
            schema,
            &update_item.write_args,
            condition_expression,
            &placeholders,
        );
        if write_operation.return_values.is_none() {
            write_operation.return_values = Some(types::ReturnValue::AllNew);
        }
        let operation = Self {
            keys,
            update_expression,
            write_operation,
        };
        Ok(operation)
    }
}

fn action_root(action: &UpdateAction) -> &str {
    match action {
        UpdateAction::Set(path, _)
        | UpdateAction::Add(path, _)
        | UpdateAction::Remove(path)
        | UpdateAction::Delete(path, _) => path.root(),
    }
}

impl UpdateItem<'_> {
    /// Execute the update item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.update_item", skip_all, err)
    )]
    pub async fn send(self, transport: &dyn Transport) -> Result<()> {
        let update_item: UpdateItemInput = (&self).try_into()?;
        let refresh = update_item.write_operation.return_values == Some(types::ReturnValue::AllNew);
        let next_version = write::common::VersionCheck::of(self.record).map(|version| version.next());
        let attributes = match transport.request(Request::UpdateItem(update_item)).await {
            Ok(Response::UpdateItem { attributes }) => attributes,
            Ok(_) => return Err(Error::UnexpectedResponse { action: "UpdateItem" }),
            Err(cause) => return Err(write::common::write_error(cause, Error::Update)),
        };
        match attributes {
            Some(attributes) if refresh => self.record.load(&attributes)?,
            _ => {
                if let Some(version) = next_version {
                    self.record.set_version(version);
                }
            }
        }
        self.record.mark(RecordState::Saved);
        Ok(())
    }
}
