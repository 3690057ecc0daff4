#![allow(dead_code)]

pub mod temp_files {
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A scratch directory holding contract documents that reference each other
    pub struct ContractDir {
        dir: TempDir,
    }

    impl ContractDir {
        pub fn new() -> Self {
            ContractDir {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        /// Write `content` to `name` (sub-directories are created) and return its path
        pub fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            path
        }

        pub fn write_json(&self, name: &str, content: &serde_json::Value) -> PathBuf {
            self.write(name, &serde_json::to_string_pretty(content).unwrap())
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }
    }

    pub fn location(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }
}

pub mod contracts {
    use serde_json::{json, Value};

    /// `basePath: /v1`, `schemes: [https]`, `GET /users/{id}` with an integer path id
    pub fn users() -> Value {
        json!({
            "swagger": "2.0",
            "info": { "title": "Users", "version": "2.1.0" },
            "host": "api.example.com",
            "basePath": "/v1",
            "schemes": ["https"],
            "consumes": ["application/json"],
            "produces": ["application/json"],
            "paths": {
                "/users/{id}": {
                    "get": {
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "type": "integer" }
                        ],
                        "responses": {
                            "200": { "description": "the user", "schema": { "$ref": "#/definitions/User" } },
                            "404": { "description": "no such user" }
                        }
                    }
                },
                "/users": {
                    "post": {
                        "parameters": [
                            { "name": "user", "in": "body", "required": true, "schema": { "$ref": "#/definitions/NewUser" } }
                        ],
                        "responses": {
                            "201": {
                                "description": "created",
                                "headers": { "Location": { "type": "string" } },
                                "schema": { "$ref": "#/definitions/User" }
                            }
                        }
                    }
                }
            },
            "definitions": {
                "NewUser": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string", "pattern": "^[a-z]+$" },
                        "born": { "type": "string", "format": "date" }
                    }
                },
                "User": {
                    "allOf": [
                        { "$ref": "#/definitions/NewUser" },
                        { "type": "object", "required": ["id"], "properties": { "id": { "type": "integer", "format": "int64" } } }
                    ]
                }
            }
        })
    }
}
