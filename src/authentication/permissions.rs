use crate::{error::ApiError, jwt::SessionData, schema::Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    ViewProfiles,
    EditProfile { owner_id: Id },
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        match self {
            ActionType::ViewProfiles => true,
            ActionType::EditProfile { owner_id } => owner_id == session.user_id,
        }
    }
}

impl SessionData {
    pub fn authorize(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.authenticate(self) {
            return Err(ApiError::Forbidden(String::from(
                "You do not have permission to perform this action.",
            )));
        }
        Ok(())
    }
}
